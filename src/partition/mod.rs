//! Batch partitioning module
//!
//! Splits the ordered account list into fixed-size slices and works out which
//! slice a backfill run should process next.
//!
//! # Overview
//!
//! - [`BatchPartitioner`] computes slices from a batch number
//! - [`BatchProgress`] reports completed batch numbers; the warehouse-backed
//!   implementation infers them from existing batch tables

mod partitioner;
mod progress;
mod types;

pub use partitioner::BatchPartitioner;
pub use progress::{
    batch_table_name, first_gap, parse_batch_index, BatchProgress, WarehouseBatchProgress,
};
pub use types::Batch;
