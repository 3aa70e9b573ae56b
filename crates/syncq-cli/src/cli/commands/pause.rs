//! `syncq pause` – stop the running engine from starting new jobs.

use anyhow::Result;

use crate::cli::control_socket::ControlRequest;

pub async fn run_pause() -> Result<()> {
    super::request(ControlRequest::Pause).await?;
    println!("Paused; running jobs will finish");
    Ok(())
}
