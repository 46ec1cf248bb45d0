//! Fixed-size batch partitioner
//!
//! The next batch number is the count of completed batches plus one, so
//! progress survives across invocations as long as the completed set does.

use super::types::Batch;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;

/// Splits an ordered list into fixed-size contiguous batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPartitioner {
    size: NonZeroUsize,
}

impl BatchPartitioner {
    /// Create a partitioner with the given batch size
    pub fn new(size: NonZeroUsize) -> Self {
        Self { size }
    }

    /// Create a partitioner, rejecting a zero batch size
    pub fn with_size(size: usize) -> Result<Self> {
        NonZeroUsize::new(size)
            .map(Self::new)
            .ok_or_else(|| Error::invalid_value("batch_size", "must be greater than zero"))
    }

    /// Items per batch
    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Number of batches needed to cover `total` items
    pub fn total_batches(&self, total: usize) -> usize {
        total.div_ceil(self.size.get())
    }

    /// The batch with a given 1-based number, if it starts inside the list
    pub fn batch_at<'a, T>(&self, items: &'a [T], index: u32) -> Option<Batch<'a, T>> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        let start = position.checked_mul(self.size.get())?;
        if start >= items.len() {
            return None;
        }
        let end = start.saturating_add(self.size.get()).min(items.len());

        Some(Batch {
            index,
            start,
            end,
            items: &items[start..end],
        })
    }

    /// The batch following the completed ones, or `None` when all are done
    pub fn next_batch<'a, T>(
        &self,
        items: &'a [T],
        completed: &BTreeSet<u32>,
    ) -> Option<Batch<'a, T>> {
        let index = u32::try_from(completed.len()).ok()?.checked_add(1)?;
        self.batch_at(items, index)
    }
}
