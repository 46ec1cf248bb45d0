//! Helpers shared by the call jobs

use crate::error::Result;
use crate::output::records_to_batch;
use crate::sanitize::sanitize_records;
use crate::types::{AccountRef, JsonObject, JsonValue};
use crate::warehouse::{TableRef, Warehouse};
use arrow::record_batch::RecordBatch;
use chrono::{SecondsFormat, Utc};
use tracing::warn;

/// Call fields parsed into UTC timestamps
pub const CALL_TIMESTAMP_COLUMNS: [&str; 2] = ["called_at", "billed_at"];

/// Accounts to process, ascending by id
pub async fn load_accounts(warehouse: &dyn Warehouse, table: &TableRef) -> Result<Vec<AccountRef>> {
    let rows = warehouse.read_rows(table, &["id", "name"], Some("id")).await?;
    let total = rows.len();

    let accounts: Vec<AccountRef> = rows.iter().filter_map(AccountRef::from_row).collect();
    if accounts.len() < total {
        warn!(
            "Skipped {} row(s) of {table} without a usable id",
            total - accounts.len()
        );
    }
    Ok(accounts)
}

/// Current time as stored in `processed_at`
pub fn processed_at_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Attach the owning account to each call
pub fn tag_calls(calls: &mut [JsonObject], account: &AccountRef) {
    let name = account
        .name
        .clone()
        .map_or(JsonValue::Null, JsonValue::String);

    for call in calls {
        call.insert("account_id".to_string(), account.id.to_json());
        call.insert("account_name".to_string(), name.clone());
    }
}

/// Set one field to the same value on every call
pub fn stamp_calls(calls: &mut [JsonObject], key: &str, value: &JsonValue) {
    for call in calls {
        call.insert(key.to_string(), value.clone());
    }
}

/// Flatten, sanitize and convert calls into a batch
pub fn calls_to_batch(calls: Vec<JsonObject>) -> Result<RecordBatch> {
    let records = sanitize_records(calls);
    records_to_batch(&records, &CALL_TIMESTAMP_COLUMNS)
}
