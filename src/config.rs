//! Runtime settings
//!
//! Everything the jobs need to know about credentials, the upstream API and
//! the warehouse layout is resolved once here and handed to each component.

use crate::auth::ApiCredentials;
use crate::error::{Error, Result};
use crate::types::OptionStringExt;
use crate::warehouse::DatasetRef;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Project used when `PROJECT_ID` is not set.
pub const DEFAULT_PROJECT_ID: &str = "data-etl-to-bigquery";

/// Dataset holding every table the jobs read or write.
pub const DEFAULT_DATASET: &str = "ctm_data";

/// Vendor API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.calltrackingmetrics.com/api/v1";

/// Upstream request budget.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 8;

/// Page size asked for on the first request of every scope.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Accounts per backfill batch.
pub const DEFAULT_BATCH_SIZE: usize = 60;

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Table names
// ============================================================================

/// Full-replace account snapshot.
pub const ACCOUNTS_TABLE: &str = "accounts";

/// Prefix of the numbered backfill tables (`activities_raw_batch_{n}`).
pub const BATCH_TABLE_PREFIX: &str = "activities_raw_batch_";

/// Append-only table receiving one day of calls per run.
pub const DAILY_TABLE: &str = "activities_raw_daily";

/// Table a finished backfill can be combined into.
pub const COMBINED_TABLE: &str = "activities_raw_combined";

// ============================================================================
// Environment variable names
// ============================================================================

pub const ENV_ACCESS_KEY: &str = "CTM_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "CTM_SECRET_KEY";
pub const ENV_PROJECT_ID: &str = "PROJECT_ID";
pub const ENV_DATASET: &str = "CTM_DATASET";
pub const ENV_API_BASE_URL: &str = "CTM_API_BASE_URL";
pub const ENV_REQUESTS_PER_SECOND: &str = "CTM_REQUESTS_PER_SECOND";
pub const ENV_PER_PAGE: &str = "CTM_PER_PAGE";
pub const ENV_BATCH_SIZE: &str = "CTM_BATCH_SIZE";
pub const ENV_WAREHOUSE_PATH: &str = "CTM_WAREHOUSE_PATH";

/// Resolved settings for one process invocation
#[derive(Debug, Clone)]
pub struct Settings {
    /// API access/secret key pair
    pub credentials: ApiCredentials,
    /// Warehouse project
    pub project_id: String,
    /// Warehouse dataset
    pub dataset: String,
    /// Vendor API root, without trailing slash
    pub api_base_url: String,
    /// Upstream request budget
    pub requests_per_second: u32,
    /// `per_page` query parameter
    pub per_page: u32,
    /// Accounts per backfill batch
    pub batch_size: usize,
    /// HTTP request timeout
    pub http_timeout: Duration,
    /// DuckDB file backing the warehouse
    pub warehouse_path: Option<PathBuf>,
}

impl Settings {
    /// Build settings with default values around a credential pair
    pub fn new(credentials: ApiCredentials) -> Self {
        Self {
            credentials,
            project_id: DEFAULT_PROJECT_ID.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            per_page: DEFAULT_PER_PAGE,
            batch_size: DEFAULT_BATCH_SIZE,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            warehouse_path: None,
        }
    }

    /// Load a `.env` file if one exists, then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).none_if_empty();
        let required = |key: &str| get(key).ok_or_else(|| Error::missing_field(key));

        let credentials = ApiCredentials::new(required(ENV_ACCESS_KEY)?, required(ENV_SECRET_KEY)?);
        let mut settings = Self::new(credentials);

        if let Some(project) = get(ENV_PROJECT_ID) {
            settings.project_id = project;
        }
        if let Some(dataset) = get(ENV_DATASET) {
            settings.dataset = dataset;
        }
        if let Some(url) = get(ENV_API_BASE_URL) {
            settings.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get(ENV_REQUESTS_PER_SECOND) {
            settings.requests_per_second = parse_positive(ENV_REQUESTS_PER_SECOND, &raw)?;
        }
        if let Some(raw) = get(ENV_PER_PAGE) {
            settings.per_page = parse_positive(ENV_PER_PAGE, &raw)?;
        }
        if let Some(raw) = get(ENV_BATCH_SIZE) {
            settings.batch_size = parse_positive(ENV_BATCH_SIZE, &raw)?;
        }
        settings.warehouse_path = get(ENV_WAREHOUSE_PATH).map(PathBuf::from);

        Ok(settings)
    }

    /// Override the warehouse file
    #[must_use]
    pub fn with_warehouse_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.warehouse_path = Some(path.into());
        self
    }

    /// Override the API root
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the request budget
    #[must_use]
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Spacing enforced between consecutive upstream requests
    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(1) / self.requests_per_second.max(1)
    }

    /// DuckDB file to open, falling back to `<project>.duckdb`
    pub fn resolved_warehouse_path(&self) -> PathBuf {
        self.warehouse_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.duckdb", self.project_id)))
    }

    /// Dataset the jobs read from and write to
    pub fn dataset_ref(&self) -> DatasetRef {
        DatasetRef::new(self.project_id.clone(), self.dataset.clone())
    }
}

fn parse_positive<T>(field: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        Ok(_) => Err(Error::invalid_value(field, "must be greater than zero")),
        Err(_) => Err(Error::invalid_value(
            field,
            format!("'{raw}' is not a number"),
        )),
    }
}
