//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::Settings;
use crate::error::Result;
use crate::jobs::{run_instrumented, AccountsSync, BatchBackfill, DailySync, JobKind, JobReport};
use crate::pagination::Fetcher;
use crate::partition::BatchPartitioner;
use crate::warehouse::DuckDbWarehouse;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Job selected by the subcommand
    pub fn job_kind(&self) -> JobKind {
        match self.cli.command {
            Commands::Accounts => JobKind::AccountsSync,
            Commands::Backfill => JobKind::BatchBackfill,
            Commands::Daily { .. } => JobKind::DailySync,
        }
    }

    /// Load settings from the environment and run the selected job
    pub async fn run(&self) -> Result<JobReport> {
        // Missing credentials fail before the job is announced
        let settings = self.settings()?;
        let kind = self.job_kind();
        run_instrumented(kind, self.execute(kind, &settings)).await
    }

    fn settings(&self) -> Result<Settings> {
        let settings = Settings::from_env()?;
        Ok(match &self.cli.warehouse {
            Some(path) => settings.with_warehouse_path(path),
            None => settings,
        })
    }

    async fn execute(&self, kind: JobKind, settings: &Settings) -> Result<JobReport> {
        let path = settings.resolved_warehouse_path();
        let warehouse = DuckDbWarehouse::open(&path, &settings.project_id)?;
        info!(
            "Using warehouse {} as project '{}'",
            path.display(),
            settings.project_id
        );

        let fetcher = Fetcher::from_settings(settings, kind.failure_policy())?;
        let dataset = settings.dataset_ref();

        match &self.cli.command {
            Commands::Accounts => {
                AccountsSync::new(&fetcher, &warehouse, dataset)
                    .run()
                    .await
            }
            Commands::Backfill => {
                let partitioner = BatchPartitioner::with_size(settings.batch_size)?;
                BatchBackfill::new(&fetcher, &warehouse, dataset, partitioner)
                    .run()
                    .await
            }
            Commands::Daily { date } => {
                let job = DailySync::new(&fetcher, &warehouse, dataset);
                let job = match date {
                    Some(day) => job.with_date(*day),
                    None => job,
                };
                job.run().await
            }
        }
    }
}
