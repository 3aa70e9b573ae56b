//! CLI for the syncq job engine.

mod commands;
mod control_socket;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use syncq_core::config;
use syncq_core::selection::QualityPreference;
use syncq_core::{JobStatus, JobType};

use commands::{
    run_cancel, run_engine, run_enqueue, run_list, run_pause, run_resume, run_select, run_status,
    RunOptions,
};

/// Top-level CLI for the syncq job engine.
#[derive(Debug, Parser)]
#[command(name = "syncq")]
#[command(about = "syncq: prioritized background jobs for a music library", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Start the engine and serve the control socket until Ctrl-C.
    Run {
        /// Worker slots (default from config).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// TOML file of jobs to enqueue at startup.
        #[arg(long, value_name = "FILE")]
        batch: Option<PathBuf>,
        /// Exit once no runnable job is left.
        #[arg(long)]
        until_idle: bool,
    },

    /// Add a job to the running engine.
    Enqueue {
        /// download, metadata_enrichment, library_scan, library_spotify_enrichment, token_refresh.
        job_type: JobType,
        /// Job payload as a JSON object.
        #[arg(long, default_value = "{}")]
        payload: String,
        /// Higher runs first.
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        priority: i32,
        /// Retries after the first attempt (default from config).
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,
    },

    /// Show engine counters, or one job in full.
    Status {
        /// Job identifier.
        id: Option<String>,
    },

    /// List jobs, oldest first.
    List {
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long = "type", value_name = "TYPE")]
        job_type: Option<JobType>,
    },

    /// Stop starting new jobs; running jobs finish.
    Pause,

    /// Start dispatching jobs again.
    Resume,

    /// Cancel a pending job, or ask a running one to stop.
    Cancel {
        /// Job identifier.
        id: String,
    },

    /// Pick the file a download would choose from a JSON list of candidates.
    Select {
        /// JSON file: array of `{ filename, bitrate, size, username? }`.
        path: PathBuf,
        /// Quality preference (default from config).
        #[arg(long)]
        quality: Option<QualityPreference>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init().context("load config")?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                workers,
                batch,
                until_idle,
            } => {
                let opts = RunOptions {
                    workers: workers.unwrap_or(cfg.workers),
                    batch,
                    until_idle,
                };
                run_engine(&cfg, opts).await?;
            }
            CliCommand::Enqueue {
                job_type,
                payload,
                priority,
                max_retries,
            } => run_enqueue(job_type, &payload, priority, max_retries).await?,
            CliCommand::Status { id } => run_status(id).await?,
            CliCommand::List { status, job_type } => run_list(status, job_type).await?,
            CliCommand::Pause => run_pause().await?,
            CliCommand::Resume => run_resume().await?,
            CliCommand::Cancel { id } => run_cancel(id).await?,
            CliCommand::Select { path, quality } => {
                run_select(&path, quality.unwrap_or(cfg.download().quality))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
