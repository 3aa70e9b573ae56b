//! Metadata enrichment handler. Serves both `metadata_enrichment` and
//! `library_spotify_enrichment`; the client sees which one through `job_type`.

use std::sync::Arc;

use crate::engine::{HandlerFuture, JobContext, JobHandler};
use crate::error::HandlerResult;
use crate::job::JobData;

use super::MetadataClient;

pub struct MetadataHandler<M> {
    client: Arc<M>,
}

impl<M: MetadataClient> MetadataHandler<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }
}

impl<M: MetadataClient> JobHandler for MetadataHandler<M> {
    fn handle(&self, ctx: JobContext) -> HandlerFuture {
        let client = Arc::clone(&self.client);
        Box::pin(async move { enrich(client.as_ref(), &ctx).await })
    }
}

async fn enrich<M: MetadataClient>(client: &M, ctx: &JobContext) -> HandlerResult<JobData> {
    ctx.check_cancelled()?;
    let enriched = client.enrich(ctx.job_type, &ctx.payload).await?;
    tracing::debug!(fields = enriched.len(), "metadata enriched");
    Ok(enriched)
}
