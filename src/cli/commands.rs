//! CLI commands and argument parsing

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CallTrackingMetrics to warehouse sync jobs
#[derive(Parser, Debug)]
#[command(name = "ctm-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// DuckDB warehouse file (overrides CTM_WAREHOUSE_PATH)
    #[arg(short, long, global = true)]
    pub warehouse: Option<PathBuf>,

    /// Log output format
    #[arg(short, long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Replace the accounts table with a fresh snapshot
    Accounts,

    /// Process the next batch of the historical calls backfill
    Backfill,

    /// Append one day of calls (yesterday by default)
    Daily {
        /// Day to fetch, as YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}
