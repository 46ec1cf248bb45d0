//! Pagination types
//!
//! Scopes, date windows and fetch configuration used by the fetcher.

use crate::config::DEFAULT_PER_PAGE;
use crate::types::{AccountId, FailurePolicy};
use chrono::{Days, NaiveDate, Utc};

/// Date format the vendor expects for `start_date` / `end_date`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which collection a paginated walk covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchScope {
    /// Every account visible to the credentials (`GET /accounts`)
    Accounts,
    /// Calls of a single account (`GET /accounts/{id}/calls`)
    AccountCalls(AccountId),
}

impl FetchScope {
    /// Path relative to the API root
    pub fn path(&self) -> String {
        match self {
            Self::Accounts => "accounts".to_string(),
            Self::AccountCalls(id) => format!("accounts/{id}/calls"),
        }
    }

    /// Response field holding the page's records
    pub fn collection_key(&self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::AccountCalls(_) => "calls",
        }
    }
}

impl std::fmt::Display for FetchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accounts => f.write_str("accounts"),
            Self::AccountCalls(id) => write!(f, "calls of account {id}"),
        }
    }
}

/// Inclusive date filter sent as `start_date` / `end_date`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// First day included
    pub start: NaiveDate,
    /// Last day included
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window covering exactly one day
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Window covering yesterday in UTC
    pub fn yesterday_utc() -> Self {
        let today = Utc::now().date_naive();
        Self::single_day(today.checked_sub_days(Days::new(1)).unwrap_or(today))
    }

    /// Query parameters for the window
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("start_date", self.start.format(DATE_FORMAT).to_string()),
            ("end_date", self.end.format(DATE_FORMAT).to_string()),
        ]
    }
}

/// Settings for one fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// `per_page` sent on the first request of every scope
    pub per_page: u32,
    /// Reaction to a non-success status
    pub policy: FailurePolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            policy: FailurePolicy::FailFast,
        }
    }
}

impl FetchConfig {
    /// Create a fetch config
    pub fn new(per_page: u32, policy: FailurePolicy) -> Self {
        Self { per_page, policy }
    }
}
