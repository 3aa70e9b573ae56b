//! `syncq list` – jobs known to the running engine.

use anyhow::{Context, Result};
use syncq_core::{JobSnapshot, JobStatus, JobType};

use crate::cli::control_socket::ControlRequest;

pub async fn run_list(status: Option<JobStatus>, job_type: Option<JobType>) -> Result<()> {
    let mut reply = super::request(ControlRequest::List { status, job_type }).await?;
    let jobs: Vec<JobSnapshot> =
        serde_json::from_value(reply["jobs"].take()).context("decode job list")?;
    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }
    println!(
        "{:<36} {:<26} {:<10} {:>5} {:>8}",
        "ID", "TYPE", "STATUS", "PRIO", "ATTEMPTS"
    );
    for j in jobs {
        println!(
            "{:<36} {:<26} {:<10} {:>5} {:>8}",
            j.id,
            j.job_type,
            j.status,
            j.priority,
            format!("{}/{}", j.attempt_count, j.max_retries + 1)
        );
    }
    Ok(())
}
