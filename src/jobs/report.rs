//! Job lifecycle reporting
//!
//! Every driver runs inside [`run_instrumented`], which emits the
//! `JOB_START` / `JOB_SUCCESS` / `JOB_FAILURE` lines schedulers key on.

use crate::error::Result;
use crate::types::FailurePolicy;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// The three jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Full accounts snapshot
    AccountsSync,
    /// One batch of the historical calls backfill
    BatchBackfill,
    /// Yesterday's calls, appended
    DailySync,
}

impl JobKind {
    /// Machine name used in structured logs
    pub fn name(self) -> &'static str {
        match self {
            Self::AccountsSync => "ctm_accounts_sync",
            Self::BatchBackfill => "ctm_batch_backfill",
            Self::DailySync => "ctm_daily_sync",
        }
    }

    /// Human title used in log messages
    pub fn title(self) -> &'static str {
        match self {
            Self::AccountsSync => "CTM Accounts sync",
            Self::BatchBackfill => "CTM Batch backfill",
            Self::DailySync => "CTM Daily Sync",
        }
    }

    /// How the job's fetcher reacts to upstream failures
    ///
    /// The backfill keeps going past a failing account; the other jobs abort.
    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            Self::BatchBackfill => FailurePolicy::SkipOnError,
            Self::AccountsSync | Self::DailySync => FailurePolicy::FailFast,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Rows were written to the destination
    Written,
    /// Upstream returned nothing to write; no write was attempted
    NoData,
    /// Every backfill batch already exists
    AllBatchesComplete,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written => f.write_str("written"),
            Self::NoData => f.write_str("no_data"),
            Self::AllBatchesComplete => f.write_str("all_batches_complete"),
        }
    }
}

/// Summary of one job run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// Which job ran
    pub kind: JobKind,
    /// How it ended
    pub outcome: JobOutcome,
    /// Accounts whose data was fetched
    pub accounts_processed: usize,
    /// Raw records returned by the API
    pub records_fetched: usize,
    /// Rows handed to the warehouse
    pub rows_written: usize,
    /// Columns of the written table
    pub columns: usize,
    /// Destination table, when a write happened
    pub destination: Option<String>,
    /// Backfill batch number, when one was selected
    pub batch_index: Option<u32>,
}

impl JobReport {
    /// Report with no activity yet
    pub fn new(kind: JobKind, outcome: JobOutcome) -> Self {
        Self {
            kind,
            outcome,
            accounts_processed: 0,
            records_fetched: 0,
            rows_written: 0,
            columns: 0,
            destination: None,
            batch_index: None,
        }
    }
}

/// Seconds rounded to two decimals
pub fn processing_seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

/// Run a job with lifecycle logging
///
/// Failures are logged with their message and then returned unchanged.
pub async fn run_instrumented<F>(kind: JobKind, job: F) -> Result<JobReport>
where
    F: Future<Output = Result<JobReport>>,
{
    let started = Instant::now();
    info!(
        job_name = kind.name(),
        status = "STARTED",
        timestamp = %Utc::now().to_rfc3339(),
        "JOB_START: {} job initiated",
        kind.title()
    );

    match job.await {
        Ok(report) => {
            info!(
                job_name = kind.name(),
                status = "SUCCESS",
                outcome = %report.outcome,
                accounts_processed = report.accounts_processed,
                records_fetched = report.records_fetched,
                rows_written = report.rows_written,
                columns = report.columns,
                destination = report.destination.as_deref().unwrap_or(""),
                processing_time_seconds = processing_seconds(started.elapsed()),
                timestamp = %Utc::now().to_rfc3339(),
                "JOB_SUCCESS: {} completed successfully",
                kind.title()
            );
            Ok(report)
        }
        Err(e) => {
            error!(
                job_name = kind.name(),
                status = "FAILED",
                error_message = %e,
                processing_time_seconds = processing_seconds(started.elapsed()),
                timestamp = %Utc::now().to_rfc3339(),
                "JOB_FAILURE: {} failed",
                kind.title()
            );
            Err(e)
        }
    }
}
