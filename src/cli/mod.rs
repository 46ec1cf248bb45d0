//! CLI module
//!
//! Command-line interface for running the sync jobs.
//!
//! # Commands
//!
//! - `accounts` - Replace the accounts snapshot
//! - `backfill` - Run the next backfill batch
//! - `daily` - Append one day of calls

mod commands;
mod runner;

pub use commands::{Cli, Commands, LogFormat};
pub use runner::Runner;
