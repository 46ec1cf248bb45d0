//! Accounts sync
//!
//! Pulls every account from the API and replaces the accounts table with the
//! snapshot.

use super::report::{JobKind, JobOutcome, JobReport};
use crate::config::ACCOUNTS_TABLE;
use crate::error::Result;
use crate::output::records_to_batch;
use crate::pagination::{FetchScope, Fetcher};
use crate::sanitize::flatten_value;
use crate::types::{JsonObject, JsonValue, WriteDisposition};
use crate::warehouse::{DatasetRef, Warehouse};
use tracing::{info, warn};

/// Account fields kept in the snapshot, in table order
pub const ACCOUNT_COLUMNS: [&str; 8] = [
    "id",
    "name",
    "user_role",
    "status",
    "created",
    "updated",
    "canceled",
    "agency_id",
];

/// Account fields parsed into UTC timestamps
pub const ACCOUNT_TIMESTAMP_COLUMNS: [&str; 3] = ["created", "updated", "canceled"];

/// Full-replace accounts snapshot
pub struct AccountsSync<'a> {
    fetcher: &'a Fetcher,
    warehouse: &'a dyn Warehouse,
    dataset: DatasetRef,
}

impl<'a> AccountsSync<'a> {
    /// Create the job
    pub fn new(fetcher: &'a Fetcher, warehouse: &'a dyn Warehouse, dataset: DatasetRef) -> Self {
        Self {
            fetcher,
            warehouse,
            dataset,
        }
    }

    /// Run the job once
    pub async fn run(&self) -> Result<JobReport> {
        info!("Fetching accounts from the CTM API");
        let accounts = self.fetcher.fetch_all(&FetchScope::Accounts, None).await?;

        if accounts.is_empty() {
            warn!("No account data returned from the CTM API");
            return Ok(JobReport::new(JobKind::AccountsSync, JobOutcome::NoData));
        }

        info!("Processing {} accounts", accounts.len());
        let fetched = accounts.len();
        let rows = select_account_columns(accounts);

        let batch = records_to_batch(&rows, &ACCOUNT_TIMESTAMP_COLUMNS)?;
        if batch.num_columns() == 0 {
            warn!("No valid account data to upload");
            let mut report = JobReport::new(JobKind::AccountsSync, JobOutcome::NoData);
            report.records_fetched = fetched;
            return Ok(report);
        }

        let table = self.dataset.table(ACCOUNTS_TABLE);
        info!("Uploading {} account records to {table}", batch.num_rows());
        let written = self
            .warehouse
            .write(&table, &batch, WriteDisposition::Replace)
            .await?;
        info!("Accounts loaded into {table}");

        Ok(JobReport {
            accounts_processed: written,
            records_fetched: fetched,
            rows_written: written,
            columns: batch.num_columns(),
            destination: Some(table.to_string()),
            ..JobReport::new(JobKind::AccountsSync, JobOutcome::Written)
        })
    }
}

/// Keep the known account fields that occur in any record
///
/// Every output row carries the same columns in [`ACCOUNT_COLUMNS`] order;
/// absent values are null and nested values become JSON text.
pub fn select_account_columns(accounts: Vec<JsonObject>) -> Vec<JsonObject> {
    let present: Vec<&str> = ACCOUNT_COLUMNS
        .iter()
        .copied()
        .filter(|col| accounts.iter().any(|a| a.contains_key(*col)))
        .collect();

    accounts
        .into_iter()
        .map(|mut account| {
            present
                .iter()
                .map(|col| {
                    let value = account.remove(*col).map_or(JsonValue::Null, flatten_value);
                    ((*col).to_string(), value)
                })
                .collect()
        })
        .collect()
}
