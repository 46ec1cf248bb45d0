//! Daily incremental sync
//!
//! Fetches one day of calls for every account, aligns them to the daily
//! table's columns and appends them.

use super::common::{calls_to_batch, load_accounts, processed_at_now, stamp_calls, tag_calls};
use super::report::{JobKind, JobOutcome, JobReport};
use crate::config::{ACCOUNTS_TABLE, DAILY_TABLE};
use crate::error::Result;
use crate::output::arrow_to_json;
use crate::pagination::{DateWindow, FetchScope, Fetcher};
use crate::schema::reconcile_or_passthrough;
use crate::types::{JsonValue, WriteDisposition};
use crate::warehouse::{DatasetRef, Warehouse};
use chrono::NaiveDate;
use tracing::{debug, info};

/// Rows logged as a sample before the append
const SAMPLE_ROWS: usize = 2;

/// Append-only daily calls sync
pub struct DailySync<'a> {
    fetcher: &'a Fetcher,
    warehouse: &'a dyn Warehouse,
    dataset: DatasetRef,
    window: DateWindow,
}

impl<'a> DailySync<'a> {
    /// Create the job for yesterday (UTC)
    pub fn new(fetcher: &'a Fetcher, warehouse: &'a dyn Warehouse, dataset: DatasetRef) -> Self {
        Self {
            fetcher,
            warehouse,
            dataset,
            window: DateWindow::yesterday_utc(),
        }
    }

    /// Process a specific day instead of yesterday
    #[must_use]
    pub fn with_date(mut self, day: NaiveDate) -> Self {
        self.window = DateWindow::single_day(day);
        self
    }

    /// Date window the job fetches
    pub fn window(&self) -> DateWindow {
        self.window
    }

    /// Run the job once
    pub async fn run(&self) -> Result<JobReport> {
        let accounts = load_accounts(self.warehouse, &self.dataset.table(ACCOUNTS_TABLE)).await?;
        info!(
            "Found {} accounts; fetching calls from {} to {}",
            accounts.len(),
            self.window.start,
            self.window.end
        );

        let mut all_calls = Vec::new();
        let mut accounts_processed = 0;
        for account in &accounts {
            info!("Processing account {} - {}", account.id, account.display_name());
            let mut calls = self
                .fetcher
                .fetch_all(
                    &FetchScope::AccountCalls(account.id.clone()),
                    Some(&self.window),
                )
                .await?;

            tag_calls(&mut calls, account);
            stamp_calls(&mut calls, "processed_at", &JsonValue::String(processed_at_now()));

            info!("Account {} processed: {} calls", account.id, calls.len());
            accounts_processed += 1;
            all_calls.extend(calls);
        }

        let fetched = all_calls.len();
        info!("Total calls fetched: {fetched}");

        let mut report = JobReport {
            accounts_processed,
            records_fetched: fetched,
            ..JobReport::new(JobKind::DailySync, JobOutcome::NoData)
        };

        if all_calls.is_empty() {
            info!("No calls fetched; nothing to write");
            return Ok(report);
        }

        let table = self.dataset.table(DAILY_TABLE);
        let frame = calls_to_batch(all_calls)?;
        info!(
            "Frame before reconciliation: {} rows x {} columns",
            frame.num_rows(),
            frame.num_columns()
        );

        let frame = reconcile_or_passthrough(self.warehouse, &table, frame).await;
        info!(
            "Frame after reconciliation: {} rows x {} columns",
            frame.num_rows(),
            frame.num_columns()
        );

        if let Ok(sample) = arrow_to_json(&frame.slice(0, frame.num_rows().min(SAMPLE_ROWS))) {
            debug!("Sample of reconciled rows: {sample:?}");
        }

        let written = self
            .warehouse
            .write(&table, &frame, WriteDisposition::Append)
            .await?;
        info!("Data appended to {table}");

        report.outcome = JobOutcome::Written;
        report.rows_written = written;
        report.columns = frame.num_columns();
        report.destination = Some(table.to_string());
        Ok(report)
    }
}
