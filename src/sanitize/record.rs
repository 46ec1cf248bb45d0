//! Record flattening and timestamp parsing

use super::names::sanitize_name;
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Replace a nested value by its JSON text; scalars pass through
pub fn flatten_value(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(_) | JsonValue::Array(_) => {
            // Serializing a Value cannot fail
            JsonValue::String(serde_json::to_string(&value).unwrap_or_default())
        }
        scalar => scalar,
    }
}

/// Flatten every field of a record to a scalar
pub fn flatten(record: JsonObject) -> JsonObject {
    record
        .into_iter()
        .map(|(key, value)| (key, flatten_value(value)))
        .collect()
}

/// Flatten a record and sanitize its field names
///
/// Field order is preserved. When two raw names sanitize to the same
/// identifier the later value wins and keeps the first one's position.
pub fn sanitize_record(record: JsonObject) -> JsonObject {
    let mut out = JsonObject::with_capacity(record.len());
    for (key, value) in flatten(record) {
        out.insert(sanitize_name(&key), value);
    }
    out
}

/// Sanitize a list of records
pub fn sanitize_records(records: Vec<JsonObject>) -> Vec<JsonObject> {
    records.into_iter().map(sanitize_record).collect()
}

// `%z` also accepts `±HH:MM` when parsing
const OFFSET_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M %z",
    "%Y-%m-%d %I:%M:%S %p %:z",
    "%Y-%m-%d %I:%M %p %:z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
];

const NAIVE_FORMATS: [&str; 9] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%MZ",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
];

/// Parse a vendor timestamp into a UTC instant
///
/// Accepts RFC 3339 and the vendor's `YYYY-MM-DD HH:MM[:SS] ±HHMM` shape in
/// 24-hour or `HH:MM AM` 12-hour form. Offset-less datetimes are taken as UTC
/// and bare dates as midnight UTC. Anything else is `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
