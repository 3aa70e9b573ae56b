//! `syncq resume` – let the engine start jobs again.

use anyhow::Result;

use crate::cli::control_socket::ControlRequest;

pub async fn run_resume() -> Result<()> {
    super::request(ControlRequest::Resume).await?;
    println!("Resumed");
    Ok(())
}
