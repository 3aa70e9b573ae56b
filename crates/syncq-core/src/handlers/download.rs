//! Download handler: search, pick a file by quality, start the transfer.
//!
//! Payload: `{ "query": str, "quality"?: "best"|"good"|"any", "timeout_secs"?: u64 }`.
//! Result: `{ "username", "filename", "size", "bitrate", "transfer_id", "candidates" }`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::config::DownloadConfig;
use crate::engine::{HandlerFuture, JobContext, JobHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::job::{job_data, JobData};
use crate::selection::{select_candidate, QualityPreference};

use super::SearchClient;

pub struct DownloadHandler<S> {
    client: Arc<S>,
    defaults: DownloadConfig,
}

impl<S: SearchClient> DownloadHandler<S> {
    pub fn new(client: Arc<S>, defaults: DownloadConfig) -> Self {
        Self { client, defaults }
    }
}

impl<S: SearchClient> JobHandler for DownloadHandler<S> {
    fn handle(&self, ctx: JobContext) -> HandlerFuture {
        let client = Arc::clone(&self.client);
        let defaults = self.defaults.clone();
        Box::pin(async move { run_download(client.as_ref(), &defaults, &ctx).await })
    }
}

async fn run_download<S: SearchClient>(
    client: &S,
    defaults: &DownloadConfig,
    ctx: &JobContext,
) -> HandlerResult<JobData> {
    let query = ctx.payload_str("query")?;
    let quality = match ctx.payload_opt_str("quality") {
        Some(q) => q
            .parse::<QualityPreference>()
            .map_err(|e| HandlerError::invalid_payload(format!("quality: {e}")))?,
        None => defaults.quality,
    };
    let timeout = Duration::from_secs(
        ctx.payload_opt_u64("timeout_secs")
            .unwrap_or(defaults.search_timeout_secs),
    );

    ctx.report_progress(job_data(json!({ "stage": "searching", "query": query })));
    let candidates = client.search(query, timeout).await?;
    ctx.check_cancelled()?;
    tracing::debug!(query, results = candidates.len(), %quality, "search finished");

    let Some(chosen) = select_candidate(&candidates, quality) else {
        return Err(HandlerError::failed(format!(
            "no file matched quality `{quality}` among {} result(s) for `{query}`",
            candidates.len()
        )));
    };

    ctx.report_progress(job_data(json!({
        "stage": "downloading",
        "candidates": candidates.len(),
        "filename": chosen.filename,
    })));
    let transfer_id = client.download(&chosen.username, &chosen.filename).await?;
    tracing::info!(
        username = %chosen.username,
        filename = %chosen.filename,
        %transfer_id,
        "transfer started"
    );

    Ok(job_data(json!({
        "stage": "queued_transfer",
        "username": chosen.username,
        "filename": chosen.filename,
        "size": chosen.size,
        "bitrate": chosen.bitrate,
        "transfer_id": transfer_id,
        "candidates": candidates.len(),
    })))
}
