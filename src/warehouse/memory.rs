//! In-memory warehouse

use super::types::{DatasetRef, TableRef};
use super::Warehouse;
use crate::error::{Error, Result};
use crate::output::arrow_to_json;
use crate::schema::{columns_of, reconcile, ColumnSpec};
use crate::types::{JsonObject, JsonValue, WriteDisposition};
use arrow::array::ArrayRef;
use arrow::compute::{cast, concat_batches};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

/// Warehouse holding one Arrow batch per table
///
/// Appends into an existing table reject columns the table does not declare
/// and null-fill the ones the batch lacks.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: Mutex<BTreeMap<TableRef, RecordBatch>>,
    writes: AtomicUsize,
}

impl MemoryWarehouse {
    /// Create an empty warehouse
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table without counting it as a write
    pub fn with_table(self, table: TableRef, batch: RecordBatch) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(table, batch);
        }
        self
    }

    /// Current contents of a table
    pub fn batch(&self, table: &TableRef) -> Option<RecordBatch> {
        self.lock().ok()?.get(table).cloned()
    }

    /// Number of `write` calls that succeeded
    pub fn write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<TableRef, RecordBatch>>> {
        self.tables
            .lock()
            .map_err(|_| Error::warehouse("Memory warehouse lock poisoned"))
    }
}

/// Append `incoming` to `existing`, aligning it to the existing columns
fn append_batches(
    table: &TableRef,
    existing: &RecordBatch,
    incoming: &RecordBatch,
) -> Result<RecordBatch> {
    let target = existing.schema();

    if let Some(unknown) = incoming
        .schema()
        .fields()
        .iter()
        .find(|f| target.index_of(f.name()).is_err())
    {
        return Err(Error::warehouse(format!(
            "No such field '{}' in {table}",
            unknown.name()
        )));
    }

    let aligned = reconcile(incoming, &columns_of(existing))?.batch;

    let columns = aligned
        .columns()
        .iter()
        .zip(target.fields())
        .map(|(column, field)| {
            if column.data_type() == field.data_type() {
                Ok(ArrayRef::clone(column))
            } else {
                cast(column, field.data_type()).map_err(|e| {
                    Error::warehouse(format!(
                        "Column '{}' of {table} cannot hold {}: {e}",
                        field.name(),
                        column.data_type()
                    ))
                })
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let aligned = RecordBatch::try_new(target.clone(), columns)?;
    Ok(concat_batches(&target, [existing, &aligned])?)
}

fn compare_json(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        (None | Some(JsonValue::Null), None | Some(JsonValue::Null)) => Ordering::Equal,
        // Nulls last, as DuckDB orders them
        (None | Some(JsonValue::Null), _) => Ordering::Greater,
        (_, None | Some(JsonValue::Null)) => Ordering::Less,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn read_rows(
        &self,
        table: &TableRef,
        columns: &[&str],
        order_by: Option<&str>,
    ) -> Result<Vec<JsonObject>> {
        let batch = self
            .lock()?
            .get(table)
            .cloned()
            .ok_or_else(|| Error::table_not_found(table.to_string()))?;

        let schema = batch.schema();
        for column in columns.iter().chain(order_by.iter()) {
            if schema.index_of(column).is_err() {
                return Err(Error::warehouse(format!(
                    "Unrecognized column '{column}' in {table}"
                )));
            }
        }

        let mut rows = arrow_to_json(&batch)?;
        if let Some(key) = order_by {
            rows.sort_by(|a, b| compare_json(a.get(key), b.get(key)));
        }

        if columns.is_empty() {
            return Ok(rows);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| ((*c).to_string(), row.get(*c).cloned().unwrap_or_default()))
                    .collect()
            })
            .collect())
    }

    async fn list_tables(&self, dataset: &DatasetRef, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|t| t.project == dataset.project && t.dataset == dataset.dataset)
            .filter(|t| t.table.starts_with(prefix))
            .map(|t| t.table.clone())
            .collect())
    }

    async fn table_schema(&self, table: &TableRef) -> Result<Vec<ColumnSpec>> {
        self.lock()?
            .get(table)
            .map(columns_of)
            .ok_or_else(|| Error::table_not_found(table.to_string()))
    }

    async fn write(
        &self,
        table: &TableRef,
        batch: &RecordBatch,
        disposition: WriteDisposition,
    ) -> Result<usize> {
        let mut tables = self.lock()?;

        let stored = match (disposition, tables.get(table)) {
            (WriteDisposition::Append, Some(existing)) => append_batches(table, existing, batch)?,
            _ => batch.clone(),
        };
        tables.insert(table.clone(), stored);
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);

        Ok(batch.num_rows())
    }
}
