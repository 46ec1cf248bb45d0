//! Warehouse module
//!
//! The table store the jobs read from and write to. Tables are addressed as
//! `project.dataset.table`.
//!
//! # Implementations
//!
//! - [`DuckDbWarehouse`]: DuckDB database file, one attached catalog per project
//! - [`MemoryWarehouse`]: in-process Arrow tables, used by tests and dry runs

mod duckdb_warehouse;
mod memory;
mod types;

pub use duckdb_warehouse::DuckDbWarehouse;
pub use memory::MemoryWarehouse;
pub use types::{quote_ident, quote_literal, DatasetRef, TableRef};

use crate::error::Result;
use crate::schema::ColumnSpec;
use crate::types::{JsonObject, WriteDisposition};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

/// Table-oriented store
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Read every row of a table
    ///
    /// An empty `columns` slice selects all columns. Rows are sorted ascending
    /// by `order_by` when given.
    async fn read_rows(
        &self,
        table: &TableRef,
        columns: &[&str],
        order_by: Option<&str>,
    ) -> Result<Vec<JsonObject>>;

    /// Names of the tables in a dataset that start with `prefix`, sorted
    async fn list_tables(&self, dataset: &DatasetRef, prefix: &str) -> Result<Vec<String>>;

    /// Declared columns of a table, in order
    ///
    /// Returns `Error::TableNotFound` when the table does not exist.
    async fn table_schema(&self, table: &TableRef) -> Result<Vec<ColumnSpec>>;

    /// Write a batch, returning the number of rows written
    async fn write(
        &self,
        table: &TableRef,
        batch: &RecordBatch,
        disposition: WriteDisposition,
    ) -> Result<usize>;
}
