// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # ctm-sync
//!
//! Scheduled jobs that copy CallTrackingMetrics data into a columnar
//! warehouse.
//!
//! ## Jobs
//!
//! - **Accounts sync**: full snapshot of every account, replacing `accounts`
//! - **Batch backfill**: historical calls, one slice of accounts per run,
//!   each slice in its own `activities_raw_batch_{n}` table
//! - **Daily sync**: yesterday's calls, aligned to and appended onto
//!   `activities_raw_daily`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ctm_sync::{config::Settings, jobs::DailySync, pagination::Fetcher};
//! use ctm_sync::warehouse::DuckDbWarehouse;
//! use ctm_sync::FailurePolicy;
//!
//! let settings = Settings::from_env()?;
//! let warehouse = DuckDbWarehouse::open("ctm.duckdb", &settings.project_id)?;
//! let fetcher = Fetcher::from_settings(&settings, FailurePolicy::FailFast)?;
//!
//! let report = DailySync::new(&fetcher, &warehouse, settings.dataset_ref())
//!     .run()
//!     .await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Job drivers                            │
//! │   AccountsSync          BatchBackfill           DailySync       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   HTTP   │ Paginate  │   Sanitize    │ Partition │  Warehouse  │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Basic    │ next_page │ Flatten       │ Batches   │ DuckDB      │
//! │ 8 req/s  │ Policies  │ Column names  │ Progress  │ Reconcile   │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Runtime settings from the environment
pub mod config;

/// API credentials
pub mod auth;

/// HTTP client with rate limiting
pub mod http;

/// Cursor-following paginated fetches
pub mod pagination;

/// Record flattening and column-name sanitizing
pub mod sanitize;

/// Arrow conversion and Parquet output
pub mod output;

/// Backfill batch partitioning
pub mod partition;

/// Schema reconciliation against existing tables
pub mod schema;

/// Warehouse abstraction and backends
pub mod warehouse;

/// Job drivers
pub mod jobs;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::Settings;
pub use jobs::{AccountsSync, BatchBackfill, DailySync, JobKind, JobOutcome, JobReport};
pub use warehouse::{DuckDbWarehouse, MemoryWarehouse, Warehouse};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
