//! Column sanitizer
//!
//! Turns vendor records into warehouse-ready rows:
//! - field names become lower-case identifiers made of `[a-z0-9_]`
//! - nested objects and lists become their JSON text
//! - timestamp fields are parsed into UTC instants at conversion time

mod names;
mod record;

pub use names::sanitize_name;
pub use record::{flatten, flatten_value, parse_timestamp, sanitize_record, sanitize_records};
