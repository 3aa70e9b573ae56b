//! `syncq status [id]` – engine counters, or one job as JSON.

use anyhow::{Context, Result};
use syncq_core::{EngineStats, JobId};

use crate::cli::control_socket::ControlRequest;

pub async fn run_status(id: Option<String>) -> Result<()> {
    let mut reply = super::request(ControlRequest::Status {
        id: id.map(JobId::from),
    })
    .await?;

    if let Some(job) = reply.get("job") {
        println!("{}", serde_json::to_string_pretty(job)?);
        return Ok(());
    }

    let stats: EngineStats =
        serde_json::from_value(reply["stats"].take()).context("decode stats")?;
    let paused = reply["paused"].as_bool().unwrap_or(false);
    print!("{}", format_stats(&stats, paused));
    Ok(())
}

fn format_stats(stats: &EngineStats, paused: bool) -> String {
    let mut out = String::new();
    let state = if paused { "paused" } else { "dispatching" };
    out.push_str(&format!("engine:    {}\n", state));
    out.push_str(&format!("queued:    {}\n", stats.queue_size));
    out.push_str(&format!(
        "pending:   {} ({} without handler)\n",
        stats.pending, stats.unhandled
    ));
    out.push_str(&format!("running:   {}\n", stats.running));
    out.push_str(&format!("completed: {}\n", stats.completed));
    out.push_str(&format!("failed:    {}\n", stats.failed));
    out.push_str(&format!("cancelled: {}\n", stats.cancelled));
    out
}
