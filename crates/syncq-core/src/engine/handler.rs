//! Handler trait and the per-attempt context handed to it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::control::CancelToken;
use crate::error::{HandlerError, HandlerResult};
use crate::job::{JobData, JobId, JobType};

use super::Shared;

/// Boxed future returned by a handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult<JobData>> + Send>>;

/// Performs the actual work for one job type.
///
/// The returned map is merged into the job's `result` on success. Returning
/// an error sends the job through the retry policy (except
/// `HandlerError::Cancelled`).
pub trait JobHandler: Send + Sync + 'static {
    fn handle(&self, ctx: JobContext) -> HandlerFuture;
}

/// Adapter turning an async closure into a `JobHandler`.
pub struct FnHandler<F>(F);

/// Wrap `f` so it can be registered as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<JobData>> + Send + 'static,
{
    FnHandler(f)
}

impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<JobData>> + Send + 'static,
{
    fn handle(&self, ctx: JobContext) -> HandlerFuture {
        Box::pin((self.0)(ctx))
    }
}

/// What a handler sees of its job during one attempt.
pub struct JobContext {
    pub id: JobId,
    pub job_type: JobType,
    pub payload: JobData,
    pub priority: i32,
    /// 1-based attempt number.
    pub attempt: u32,
    cancel: CancelToken,
    shared: Arc<Shared>,
}

impl JobContext {
    pub(super) fn new(
        id: JobId,
        job_type: JobType,
        payload: JobData,
        priority: i32,
        attempt: u32,
        cancel: CancelToken,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            job_type,
            payload,
            priority,
            attempt,
            cancel,
            shared,
        }
    }

    /// True once `cancel` has been called for this job.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Return `Err(HandlerError::Cancelled)` if cancellation was requested.
    pub fn check_cancelled(&self) -> HandlerResult<()> {
        if self.is_cancelled() {
            Err(HandlerError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Clone of the cancel token, for handlers that move work to another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Merge `update` into the job's `result` while it is still running.
    pub fn report_progress(&self, update: JobData) {
        self.shared.record_progress(&self.id, update);
    }

    /// Owned progress handle, for work moved off the handler's task.
    pub fn progress_reporter(&self) -> ProgressReporter {
        ProgressReporter {
            id: self.id.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Required string field from the payload.
    pub fn payload_str(&self, key: &str) -> HandlerResult<&str> {
        self.payload
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandlerError::invalid_payload(format!("missing string field `{key}`")))
    }

    /// Optional string field from the payload.
    pub fn payload_opt_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }

    /// Optional unsigned field from the payload.
    pub fn payload_opt_u64(&self, key: &str) -> Option<u64> {
        self.payload.get(key).and_then(|v| v.as_u64())
    }
}

/// Writes progress into one job's `result`; ignored once the job has left
/// Running.
#[derive(Clone)]
pub struct ProgressReporter {
    id: JobId,
    shared: Arc<Shared>,
}

impl ProgressReporter {
    pub fn report(&self, update: JobData) {
        self.shared.record_progress(&self.id, update);
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("id", &self.id)
            .field("job_type", &self.job_type)
            .field("attempt", &self.attempt)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
