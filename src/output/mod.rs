//! Output module
//!
//! Converts sanitized records into Arrow RecordBatches and stages them as
//! Parquet files for warehouse loads.

mod schema;
mod writer;

pub use schema::{arrow_to_json, infer_schema, records_to_batch, timestamp_type};
pub use writer::{write_batch_to_parquet, ParquetWriter, ParquetWriterConfig};
