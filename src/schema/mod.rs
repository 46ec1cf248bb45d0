//! Schema reconciliation module
//!
//! Aligns record batches to a warehouse table's declared columns before an
//! append.
//!
//! # Rules
//!
//! - **Missing columns**: added, entirely null
//! - **Extra columns**: dropped
//! - **Order**: exactly the declared order
//! - **Unavailable schema**: batch passes through unreconciled

mod reconcile;
mod types;

pub use reconcile::{reconcile, reconcile_or_passthrough};
pub use types::{columns_of, ColumnSpec, Reconciled};
