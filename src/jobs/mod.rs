//! Job drivers
//!
//! The three scheduled jobs, each a thin orchestration of the fetcher,
//! sanitizer, partitioner, reconciler and warehouse:
//!
//! | Job                | Source                   | Destination                  | Write   |
//! |--------------------|--------------------------|------------------------------|---------|
//! | [`AccountsSync`]   | `GET /accounts`          | `accounts`                   | replace |
//! | [`BatchBackfill`]  | `GET /accounts/{id}/calls` | `activities_raw_batch_{n}` | replace |
//! | [`DailySync`]      | calls of yesterday       | `activities_raw_daily`       | append  |

mod accounts;
mod backfill;
mod common;
mod daily;
mod report;

pub use accounts::{select_account_columns, AccountsSync, ACCOUNT_COLUMNS, ACCOUNT_TIMESTAMP_COLUMNS};
pub use backfill::{combined_table_sql, BatchBackfill};
pub use common::{load_accounts, CALL_TIMESTAMP_COLUMNS};
pub use daily::DailySync;
pub use report::{processing_seconds, run_instrumented, JobKind, JobOutcome, JobReport};

#[cfg(test)]
mod tests;
