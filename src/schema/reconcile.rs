//! Schema reconciliation
//!
//! Projects a freshly built batch onto a table's declared columns so that an
//! append never introduces unknown columns. Missing columns are null-filled,
//! extra columns are dropped, and the result follows the declared order.

use super::types::{ColumnSpec, Reconciled};
use crate::error::{Error, Result};
use crate::warehouse::{TableRef, Warehouse};
use arrow::array::{new_null_array, ArrayRef};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Align `batch` to `target`
///
/// Present columns keep their values and type. Missing ones become all-null
/// columns of the declared type.
pub fn reconcile(batch: &RecordBatch, target: &[ColumnSpec]) -> Result<Reconciled> {
    let input_schema = batch.schema();
    let rows = batch.num_rows();

    let mut fields = Vec::with_capacity(target.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(target.len());
    let mut added = Vec::new();
    let mut seen = HashSet::with_capacity(target.len());

    for spec in target {
        if !seen.insert(spec.name.as_str()) {
            return Err(Error::output(format!(
                "Target schema declares column '{}' more than once",
                spec.name
            )));
        }

        match input_schema.index_of(&spec.name) {
            Ok(idx) => {
                fields.push(input_schema.field(idx).clone());
                columns.push(Arc::clone(batch.column(idx)));
            }
            Err(_) => {
                let dtype = spec.data_type();
                columns.push(new_null_array(&dtype, rows));
                fields.push(Field::new(spec.name.clone(), dtype, true));
                added.push(spec.name.clone());
            }
        }
    }

    let dropped = input_schema
        .fields()
        .iter()
        .filter(|f| !seen.contains(f.name().as_str()))
        .map(|f| f.name().clone())
        .collect();

    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    let batch = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)?;

    Ok(Reconciled {
        batch,
        added,
        dropped,
    })
}

/// Reconcile against a table's current schema, or pass the batch through
///
/// When the schema cannot be read (missing table, lookup failure) or the
/// projection fails, the original batch is returned unchanged and the
/// warehouse's own validation decides on the write.
pub async fn reconcile_or_passthrough(
    warehouse: &dyn Warehouse,
    table: &TableRef,
    batch: RecordBatch,
) -> RecordBatch {
    let target = match warehouse.table_schema(table).await {
        Ok(target) if !target.is_empty() => target,
        Ok(_) => {
            warn!("Table {table} declares no columns. Skipping schema reconciliation");
            return batch;
        }
        Err(e) => {
            warn!("Could not read schema of {table}: {e}. Skipping schema reconciliation");
            return batch;
        }
    };

    match reconcile(&batch, &target) {
        Ok(reconciled) => {
            if !reconciled.added.is_empty() {
                info!(
                    "Added {} missing column(s) as nulls for {table}: {:?}",
                    reconciled.added.len(),
                    reconciled.added
                );
            }
            if !reconciled.dropped.is_empty() {
                info!(
                    "Dropped {} column(s) not in {table}: {:?}",
                    reconciled.dropped.len(),
                    reconciled.dropped
                );
            }
            reconciled.batch
        }
        Err(e) => {
            warn!("Schema reconciliation for {table} failed: {e}. Using original columns");
            batch
        }
    }
}
