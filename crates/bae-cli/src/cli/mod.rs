//! CLI for the Batch Acquisition Engine (BAE).
//!
//! Command surface grounded on `ddm-cli`'s `Cli`/`CliCommand` shape and
//! dispatch (`SPEC_FULL.md` §10): one subcommand per engine entry point,
//! a `Store` opened once per invocation, and the teacher's control socket
//! for out-of-process pause/cancel signalling while `run` is in flight.

mod commands;
pub mod control_socket;

use anyhow::Result;
use bae_core::config;
use bae_core::store::Store;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_import, run_job, run_pause, run_remove, run_resume, run_status};

/// Top-level CLI for the Batch Acquisition Engine.
#[derive(Debug, Parser)]
#[command(name = "bae")]
#[command(about = "BAE: batch satellite granule acquisition engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Import a site list (.csv, .xlsx, .xls) and create a batch job.
    Import {
        /// Path to the site-list file.
        path: PathBuf,
        /// Name for the created job (default: the file's stem).
        #[arg(long)]
        name: Option<String>,
        /// Default radius in km for sites that don't specify one.
        #[arg(long, default_value = "10.0")]
        radius_km: f64,
        /// Default acquisition start date (YYYY-MM-DD).
        #[arg(long)]
        date_start: String,
        /// Default acquisition end date (YYYY-MM-DD).
        #[arg(long)]
        date_end: String,
        /// Default hour-of-day list, comma-separated (0-23).
        #[arg(long, value_delimiter = ',', default_value = "16")]
        hours: Vec<u32>,
        /// Default max cloud fraction (0.0-1.0).
        #[arg(long, default_value = "0.5")]
        max_cloud: f64,
        /// Default max solar zenith angle in degrees.
        #[arg(long, default_value = "70.0")]
        max_sza: f64,
    },

    /// Run a job via the Batch Scheduler to a terminal state.
    Run {
        /// Job identifier.
        id: i64,
    },

    /// Signal pause on a running job.
    Pause {
        /// Job identifier.
        id: i64,
    },

    /// Re-enter `run` on a paused or errored job.
    Resume {
        /// Job identifier.
        id: i64,
    },

    /// List jobs, or show one job's sites and datasets.
    Status {
        /// Job identifier; omit to list all jobs.
        id: Option<i64>,
    },

    /// Remove a job and all its sites, datasets, granules, and on-disk files.
    Remove {
        /// Job identifier.
        id: i64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = Store::open(&cfg.data_dir).await?;

        let recovered = bae_core::recovery::recover(&store).await?;
        if recovered > 0 {
            tracing::info!("recovered {} job(s) from previous run", recovered);
        }

        match cli.command {
            CliCommand::Import {
                path,
                name,
                radius_km,
                date_start,
                date_end,
                hours,
                max_cloud,
                max_sza,
            } => {
                run_import(
                    &store, &path, name, radius_km, &date_start, &date_end, hours, max_cloud,
                    max_sza,
                )
                .await?
            }
            CliCommand::Run { id } => run_job(&store, &cfg, id).await?,
            CliCommand::Pause { id } => run_pause(&store, id).await?,
            CliCommand::Resume { id } => run_resume(&store, &cfg, id).await?,
            CliCommand::Status { id } => run_status(&store, id).await?,
            CliCommand::Remove { id } => run_remove(&store, id).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
