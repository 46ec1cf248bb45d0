//! Pagination module
//!
//! Cursor pagination against the vendor API: each page body carries an
//! opaque `next_page` URL, absent on the last page.
//!
//! # Overview
//!
//! `Fetcher::fetch_all` walks one scope (all accounts, or one account's calls)
//! to completion and returns the concatenated records. The reaction to a
//! non-success status is the fetcher's `FailurePolicy`.

mod fetcher;
mod types;

pub use fetcher::{extract_records, next_page_url, Fetcher, NEXT_PAGE_FIELD};
pub use types::{DateWindow, FetchConfig, FetchScope, DATE_FORMAT};
