//! `syncq run` – host the engine: built-in handlers, startup batch, control
//! socket, then wait for Ctrl-C (or idleness) and stop gracefully.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use syncq_core::config::EngineConfig;
use syncq_core::handlers::{FsLibraryScanner, LibraryScanHandler};
use syncq_core::{EnqueueOptions, JobData, JobEngine, JobType};

use crate::cli::control_socket;

const IDLE_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub workers: usize,
    pub batch: Option<PathBuf>,
    pub until_idle: bool,
}

/// One `[[job]]` entry of a batch file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchJob {
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(default)]
    pub priority: i32,
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub payload: JobData,
}

#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default, rename = "job")]
    jobs: Vec<BatchJob>,
}

pub fn parse_batch(text: &str) -> Result<Vec<BatchJob>> {
    let file: BatchFile = toml::from_str(text)?;
    Ok(file.jobs)
}

fn load_batch(path: &Path) -> Result<Vec<BatchJob>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read batch {}", path.display()))?;
    parse_batch(&text).with_context(|| format!("parse batch {}", path.display()))
}

pub async fn run_engine(cfg: &EngineConfig, opts: RunOptions) -> Result<()> {
    let engine = JobEngine::from_config(cfg);
    engine.register_handler(
        JobType::LibraryScan,
        LibraryScanHandler::new(Arc::new(FsLibraryScanner)),
    );

    if let Some(path) = &opts.batch {
        let jobs = load_batch(path)?;
        let count = jobs.len();
        for job in jobs {
            let mut enqueue = EnqueueOptions::priority(job.priority);
            enqueue.max_retries = job.max_retries;
            engine.enqueue(job.job_type, job.payload, enqueue)?;
        }
        tracing::info!(count, batch = %path.display(), "batch enqueued");
        println!("Enqueued {count} job(s) from {}", path.display());
    }

    engine.start(opts.workers)?;

    let listener = match syncq_core::control::default_control_socket_path() {
        Ok(path) => match control_socket::spawn_control_listener(engine.clone(), &path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some((handle, path))
            }
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("control socket path: {}", e);
            None
        }
    };

    println!("syncq running with {} worker(s); Ctrl-C to stop", opts.workers);
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("listen for Ctrl-C")?;
            println!("Stopping; waiting for running jobs");
        }
        _ = wait_until_idle(&engine), if opts.until_idle => {}
    }

    engine.stop().await;
    if let Some((handle, path)) = listener {
        handle.abort();
        let _ = std::fs::remove_file(&path);
    }

    let stats = engine.get_stats();
    println!(
        "completed {}, failed {}, cancelled {}, still pending {}",
        stats.completed, stats.failed, stats.cancelled, stats.pending
    );
    Ok(())
}

async fn wait_until_idle(engine: &JobEngine) {
    loop {
        let stats = engine.wait_idle(IDLE_POLL).await;
        if stats.outstanding() == 0 {
            if stats.unhandled > 0 {
                tracing::info!(unhandled = stats.unhandled, "idle with jobs that have no handler");
            }
            return;
        }
        tracing::debug!(pending = stats.pending, running = stats.running, "waiting for jobs");
    }
}
