//! CLI command handlers, one file per command.

mod cancel;
mod enqueue;
mod list;
mod pause;
mod resume;
mod run;
mod select;
mod status;

pub use cancel::run_cancel;
pub use enqueue::run_enqueue;
pub use list::run_list;
pub use pause::run_pause;
pub use resume::run_resume;
pub use run::{run_engine, RunOptions};
pub use select::run_select;
pub use status::run_status;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::cli::control_socket::{self, ControlRequest};

/// Send `request` to the engine started by `syncq run`.
async fn request(request: ControlRequest) -> Result<Value> {
    let path = syncq_core::control::default_control_socket_path()
        .context("locate control socket")?;
    control_socket::send_request(&path, &request).await
}
