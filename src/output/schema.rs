//! Arrow schema inference and JSON to Arrow conversion
//!
//! Records arrive flattened, so every value is a JSON scalar. Columns keep the
//! order in which they first appear across the record set.

use crate::error::{Error, Result};
use crate::sanitize::parse_timestamp;
use crate::types::{JsonObject, JsonValue};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit, TimestampMicrosecondType};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::array_value_to_string;
use chrono::SecondsFormat;
use std::collections::HashMap;
use std::sync::Arc;

/// Arrow type used for parsed timestamp columns
pub fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Infer an ordered Arrow schema from flattened records
///
/// Columns listed in `timestamp_columns` are typed as UTC timestamps. A column
/// that is null in every record is typed as text.
pub fn infer_schema(records: &[JsonObject], timestamp_columns: &[&str]) -> Schema {
    let mut order: Vec<String> = Vec::new();
    let mut field_types: HashMap<String, DataType> = HashMap::new();

    for record in records {
        for (key, value) in record {
            let inferred = infer_type(value);
            match field_types.get_mut(key) {
                Some(existing) => *existing = merge_types(existing, &inferred),
                None => {
                    order.push(key.clone());
                    field_types.insert(key.clone(), inferred);
                }
            }
        }
    }

    let fields: Vec<Field> = order
        .into_iter()
        .map(|name| {
            let dtype = if timestamp_columns.contains(&name.as_str()) {
                timestamp_type()
            } else {
                match field_types.remove(&name) {
                    Some(DataType::Null) | None => DataType::Utf8,
                    Some(dtype) => dtype,
                }
            };
            Field::new(name, dtype, true)
        })
        .collect();

    Schema::new(fields)
}

/// Convert flattened records into a RecordBatch
pub fn records_to_batch(records: &[JsonObject], timestamp_columns: &[&str]) -> Result<RecordBatch> {
    let schema = Arc::new(infer_schema(records, timestamp_columns));

    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let values: Vec<Option<&JsonValue>> =
                records.iter().map(|r| r.get(field.name())).collect();
            build_array(&values, field.data_type())
        })
        .collect::<Result<Vec<ArrayRef>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(records.len()));
    RecordBatch::try_new_with_options(schema, columns, &options)
        .map_err(|e| Error::output(format!("Failed to create RecordBatch: {e}")))
}

fn infer_type(value: &JsonValue) -> DataType {
    match value {
        JsonValue::Null => DataType::Null,
        JsonValue::Bool(_) => DataType::Boolean,
        JsonValue::Number(n) if n.is_i64() => DataType::Int64,
        JsonValue::Number(_) => DataType::Float64,
        _ => DataType::Utf8,
    }
}

/// Merge two data types into a compatible type
fn merge_types(type1: &DataType, type2: &DataType) -> DataType {
    match (type1, type2) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        // Anything else is kept as text
        _ => DataType::Utf8,
    }
}

/// Build an Arrow array of the given type from JSON scalars
fn build_array(values: &[Option<&JsonValue>], data_type: &DataType) -> Result<ArrayRef> {
    let array: ArrayRef = match data_type {
        DataType::Boolean => Arc::new(
            values
                .iter()
                .map(|v| v.and_then(JsonValue::as_bool))
                .collect::<BooleanArray>(),
        ),
        DataType::Int64 => Arc::new(
            values
                .iter()
                .map(|v| v.and_then(JsonValue::as_i64))
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            values
                .iter()
                .map(|v| v.and_then(JsonValue::as_f64))
                .collect::<Float64Array>(),
        ),
        DataType::Utf8 => Arc::new(
            values
                .iter()
                .map(|v| v.and_then(scalar_text))
                .collect::<StringArray>(),
        ),
        DataType::Timestamp(TimeUnit::Microsecond, tz) => Arc::new(
            values
                .iter()
                .map(|v| {
                    v.and_then(JsonValue::as_str)
                        .and_then(parse_timestamp)
                        .map(|dt| dt.timestamp_micros())
                })
                .collect::<TimestampMicrosecondArray>()
                .with_timezone_opt(tz.clone()),
        ),
        other => {
            return Err(Error::output(format!(
                "Unsupported column type for JSON records: {other}"
            )))
        }
    };
    Ok(array)
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Convert a RecordBatch back into JSON rows
///
/// Timestamps are rendered as RFC 3339 text in UTC.
pub fn arrow_to_json(batch: &RecordBatch) -> Result<Vec<JsonObject>> {
    let schema = batch.schema();
    let mut rows = Vec::with_capacity(batch.num_rows());

    for row in 0..batch.num_rows() {
        let mut record = JsonObject::with_capacity(schema.fields().len());
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            record.insert(field.name().clone(), array_value_to_json(column, row)?);
        }
        rows.push(record);
    }

    Ok(rows)
}

fn array_value_to_json(array: &ArrayRef, row: usize) -> Result<JsonValue> {
    if array.is_null(row) {
        return Ok(JsonValue::Null);
    }

    let value = match array.data_type() {
        DataType::Null => JsonValue::Null,
        DataType::Boolean => JsonValue::Bool(array.as_boolean().value(row)),
        DataType::Int64 => JsonValue::from(
            array
                .as_primitive::<arrow::datatypes::Int64Type>()
                .value(row),
        ),
        DataType::Float64 => {
            let val = array
                .as_primitive::<arrow::datatypes::Float64Type>()
                .value(row);
            serde_json::Number::from_f64(val).map_or(JsonValue::Null, JsonValue::Number)
        }
        DataType::Utf8 => JsonValue::String(array.as_string::<i32>().value(row).to_string()),
        DataType::Timestamp(TimeUnit::Microsecond, _) => array
            .as_primitive::<TimestampMicrosecondType>()
            .value_as_datetime(row)
            .map_or(JsonValue::Null, |dt| {
                JsonValue::String(dt.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }),
        _ => JsonValue::String(
            array_value_to_string(array, row)
                .map_err(|e| Error::output(format!("Failed to render value: {e}")))?,
        ),
    };
    Ok(value)
}
