//! Batch backfill
//!
//! Each run processes the next slice of accounts and writes its calls to a
//! dedicated `activities_raw_batch_{n}` table. Progress is whatever batch
//! tables already exist, so the job is re-run until every slice is done.

use super::common::{calls_to_batch, load_accounts, processed_at_now, stamp_calls, tag_calls};
use super::report::{JobKind, JobOutcome, JobReport};
use crate::config::{ACCOUNTS_TABLE, BATCH_TABLE_PREFIX, COMBINED_TABLE};
use crate::error::Result;
use crate::pagination::{FetchScope, Fetcher};
use crate::partition::{
    batch_table_name, first_gap, Batch, BatchPartitioner, BatchProgress, WarehouseBatchProgress,
};
use crate::types::{AccountRef, JsonValue, WriteDisposition};
use crate::warehouse::{DatasetRef, Warehouse};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Accounts listed individually before a batch starts
const PREVIEW_ACCOUNTS: usize = 5;

/// Resumable multi-invocation calls backfill
pub struct BatchBackfill<'a> {
    fetcher: &'a Fetcher,
    warehouse: &'a dyn Warehouse,
    dataset: DatasetRef,
    partitioner: BatchPartitioner,
}

impl<'a> BatchBackfill<'a> {
    /// Create the job
    pub fn new(
        fetcher: &'a Fetcher,
        warehouse: &'a dyn Warehouse,
        dataset: DatasetRef,
        partitioner: BatchPartitioner,
    ) -> Self {
        Self {
            fetcher,
            warehouse,
            dataset,
            partitioner,
        }
    }

    /// Run one batch, with progress read from existing batch tables
    pub async fn run(&self) -> Result<JobReport> {
        let progress =
            WarehouseBatchProgress::new(self.warehouse, self.dataset.clone(), BATCH_TABLE_PREFIX);
        self.run_with_progress(&progress).await
    }

    /// Run one batch against an explicit progress oracle
    pub async fn run_with_progress(&self, progress: &dyn BatchProgress) -> Result<JobReport> {
        let accounts = load_accounts(self.warehouse, &self.dataset.table(ACCOUNTS_TABLE)).await?;
        info!("Loaded {} accounts ordered by id", accounts.len());

        let mut completed = match progress.completed_batches().await {
            Ok(completed) => completed,
            Err(e) => {
                warn!("Could not list existing batch tables: {e}. Assuming none are complete");
                BTreeSet::new()
            }
        };
        if let Some(gap) = first_gap(&completed) {
            warn!(
                "Batch {gap} is missing but later batches exist; batch numbers are assigned by count"
            );
        }

        let Some(batch) = self.partitioner.next_batch(&accounts, &completed) else {
            info!("All batches have been completed");
            if let Some(sql) = combined_table_sql(&self.dataset, &completed) {
                info!("Ready to combine batch tables:\n{sql}");
            }
            let mut report = JobReport::new(JobKind::BatchBackfill, JobOutcome::AllBatchesComplete);
            report.batch_index = completed.last().copied();
            return Ok(report);
        };

        let table = self.dataset.table(batch_table_name(BATCH_TABLE_PREFIX, batch.index));
        log_batch_plan(&batch, &table.table);

        let batch_number = JsonValue::from(batch.index);
        let mut all_calls = Vec::new();
        for account in batch.items {
            info!("Processing account {} - {}", account.id, account.display_name());
            let mut calls = self
                .fetcher
                .fetch_all(&FetchScope::AccountCalls(account.id.clone()), None)
                .await?;

            tag_calls(&mut calls, account);
            stamp_calls(&mut calls, "batch_number", &batch_number);
            stamp_calls(&mut calls, "processed_at", &JsonValue::String(processed_at_now()));

            info!("Account {} processed: {} calls", account.id, calls.len());
            all_calls.extend(calls);
        }

        let fetched = all_calls.len();
        info!("Total calls fetched for batch {}: {fetched}", batch.index);

        let mut report = JobReport {
            accounts_processed: batch.len(),
            records_fetched: fetched,
            batch_index: Some(batch.index),
            ..JobReport::new(JobKind::BatchBackfill, JobOutcome::NoData)
        };

        if all_calls.is_empty() {
            warn!(
                "No calls fetched for batch {}; nothing written, the next run retries it",
                batch.index
            );
            return Ok(report);
        }

        let frame = calls_to_batch(all_calls)?;
        info!(
            "Batch {} frame: {} rows x {} columns",
            batch.index,
            frame.num_rows(),
            frame.num_columns()
        );

        let written = self
            .warehouse
            .write(&table, &frame, WriteDisposition::Replace)
            .await?;
        info!("Batch {} uploaded to {table}", batch.index);

        completed.insert(batch.index);
        match self.partitioner.next_batch(&accounts, &completed) {
            Some(next) => info!(
                "Next: batch {} ({} accounts). Run this job again to process it",
                next.index,
                next.len()
            ),
            None => info!(
                "Batch {} completed. Total batches created: {}",
                batch.index,
                completed.len()
            ),
        }

        report.outcome = JobOutcome::Written;
        report.rows_written = written;
        report.columns = frame.num_columns();
        report.destination = Some(table.to_string());
        Ok(report)
    }
}

fn log_batch_plan(batch: &Batch<'_, AccountRef>, table: &str) {
    info!("Processing batch {} into table {table}", batch.index);
    info!(
        "Accounts {} to {} ({} accounts)",
        batch.start + 1,
        batch.end,
        batch.len()
    );
    if let (Some(first), Some(last)) = (batch.items.first(), batch.items.last()) {
        info!("Account range: {} to {}", first.id, last.id);
    }
    for account in batch.items.iter().take(PREVIEW_ACCOUNTS) {
        info!("  - {}: {}", account.id, account.display_name());
    }
    if batch.len() > PREVIEW_ACCOUNTS {
        info!("  ... and {} more", batch.len() - PREVIEW_ACCOUNTS);
    }
}

/// SQL that unions every completed batch table into the combined table
pub fn combined_table_sql(dataset: &DatasetRef, completed: &BTreeSet<u32>) -> Option<String> {
    if completed.is_empty() {
        return None;
    }

    let selects: Vec<String> = completed
        .iter()
        .map(|&n| {
            let table = dataset.table(batch_table_name(BATCH_TABLE_PREFIX, n));
            format!("SELECT * FROM {}", table.qualified())
        })
        .collect();

    Some(format!(
        "CREATE OR REPLACE TABLE {} AS\n{};",
        dataset.table(COMBINED_TABLE).qualified(),
        selects.join("\nUNION ALL BY NAME\n")
    ))
}
