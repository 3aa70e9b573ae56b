//! `syncq cancel <id>`

use anyhow::Result;
use serde_json::Value;
use syncq_core::JobId;

use crate::cli::control_socket::ControlRequest;

pub async fn run_cancel(id: String) -> Result<()> {
    let reply = super::request(ControlRequest::Cancel {
        id: JobId::from(id.clone()),
    })
    .await?;
    if reply.get("cancelled").and_then(Value::as_bool) == Some(true) {
        println!("Cancelled job {id}");
    } else if reply.get("signalled").and_then(Value::as_bool) == Some(true) {
        println!("Job {id} is running or finished; asked it to stop");
    }
    Ok(())
}
