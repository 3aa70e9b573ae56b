//! `syncq enqueue <type>` – add a job to the running engine.

use anyhow::{Context, Result};
use serde_json::Value;
use syncq_core::{JobData, JobType};

use crate::cli::control_socket::ControlRequest;

pub async fn run_enqueue(
    job_type: JobType,
    payload: &str,
    priority: i32,
    max_retries: Option<u32>,
) -> Result<()> {
    let payload: JobData =
        serde_json::from_str(payload).context("--payload must be a JSON object")?;
    let reply = super::request(ControlRequest::Enqueue {
        job_type,
        priority,
        max_retries,
        payload,
    })
    .await?;
    let id = reply.get("id").and_then(Value::as_str).unwrap_or("?");
    println!("{id}");
    Ok(())
}
