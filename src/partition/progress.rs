//! Batch progress oracle
//!
//! Completed batches are read back from the warehouse: batch `n` counts as
//! done once a table named `<prefix><n>` exists. A partially written table
//! is indistinguishable from a complete one.

use crate::error::Result;
use crate::warehouse::{DatasetRef, Warehouse};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::warn;

/// Source of the set of completed batch numbers
#[async_trait]
pub trait BatchProgress: Send + Sync {
    /// Batch numbers already completed
    async fn completed_batches(&self) -> Result<BTreeSet<u32>>;
}

/// Progress derived from batch tables present in a dataset
pub struct WarehouseBatchProgress<'a> {
    warehouse: &'a dyn Warehouse,
    dataset: DatasetRef,
    prefix: String,
}

impl<'a> WarehouseBatchProgress<'a> {
    /// Track tables named `<prefix><n>` in `dataset`
    pub fn new(warehouse: &'a dyn Warehouse, dataset: DatasetRef, prefix: impl Into<String>) -> Self {
        Self {
            warehouse,
            dataset,
            prefix: prefix.into(),
        }
    }

    /// Table name of batch `index`
    pub fn table_name(&self, index: u32) -> String {
        batch_table_name(&self.prefix, index)
    }
}

#[async_trait]
impl BatchProgress for WarehouseBatchProgress<'_> {
    async fn completed_batches(&self) -> Result<BTreeSet<u32>> {
        let tables = self.warehouse.list_tables(&self.dataset, &self.prefix).await?;

        let mut completed = BTreeSet::new();
        for table in tables {
            match parse_batch_index(&table, &self.prefix) {
                Some(index) => {
                    completed.insert(index);
                }
                None => warn!("Ignoring table '{table}': no batch number after '{}'", self.prefix),
            }
        }
        Ok(completed)
    }
}

/// Table name of batch `index`
pub fn batch_table_name(prefix: &str, index: u32) -> String {
    format!("{prefix}{index}")
}

/// Batch number encoded in a table name, if any
pub fn parse_batch_index(table: &str, prefix: &str) -> Option<u32> {
    let suffix = table.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().filter(|&n| n > 0)
}

/// First batch number missing below the highest completed one
pub fn first_gap(completed: &BTreeSet<u32>) -> Option<u32> {
    (1..=completed.last().copied()?).find(|n| !completed.contains(n))
}
