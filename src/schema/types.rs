//! Schema types

use crate::output::timestamp_type;
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

/// One declared column of a warehouse table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Warehouse type name as reported by the warehouse (e.g. `VARCHAR`, `INT64`)
    #[serde(rename = "type")]
    pub field_type: String,
}

impl ColumnSpec {
    /// Create a column spec
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }

    /// Describe an Arrow field in warehouse terms
    pub fn from_field(field: &Field) -> Self {
        let field_type = match field.data_type() {
            DataType::Boolean => "BOOL",
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => "INT64",
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => "INT64",
            DataType::Float32 | DataType::Float64 => "FLOAT64",
            DataType::Timestamp(_, _) => "TIMESTAMP",
            DataType::Date32 | DataType::Date64 => "DATE",
            _ => "STRING",
        };
        Self::new(field.name().clone(), field_type)
    }

    /// Arrow type used when a column of this declared type must be produced
    ///
    /// Unknown type names fall back to text.
    pub fn data_type(&self) -> DataType {
        let upper = self.field_type.trim().to_ascii_uppercase();
        match upper.as_str() {
            t if t.starts_with("TIMESTAMP") || t == "DATETIME" => timestamp_type(),
            "DATE" => DataType::Date32,
            "BOOL" | "BOOLEAN" => DataType::Boolean,
            "INT64" | "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" => DataType::Int64,
            t if t.starts_with("FLOAT")
                || t.starts_with("NUMERIC")
                || t.starts_with("DECIMAL")
                || t == "DOUBLE"
                || t == "REAL" =>
            {
                DataType::Float64
            }
            _ => DataType::Utf8,
        }
    }
}

/// Column specs of every field of a batch, in batch order
pub fn columns_of(batch: &RecordBatch) -> Vec<ColumnSpec> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| ColumnSpec::from_field(f))
        .collect()
}

/// A batch aligned to a target column list
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Batch with exactly the target columns, in target order
    pub batch: RecordBatch,
    /// Target columns that were absent and filled with nulls
    pub added: Vec<String>,
    /// Input columns that the target does not declare
    pub dropped: Vec<String>,
}

