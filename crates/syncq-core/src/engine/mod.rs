//! In-process background job engine.
//!
//! Producers call [`JobEngine::enqueue`]; a fixed pool of worker loops started
//! with [`JobEngine::start`] pulls the highest-priority ready job, runs the
//! handler registered for its type and applies the retry policy to the outcome.
//! All state (job table, ready-set, handler map, pause flag) sits behind one
//! mutex that is never held across an `.await`.
//!
//! `JobEngine` is a cheap handle; clones share the same engine.

mod handler;
mod state;
mod stats;
mod worker;


use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::error::{EngineError, HandlerError};
use crate::job::{EnqueueOptions, JobData, JobId, JobSnapshot, JobStatus, JobType};
use crate::retry::RetryPolicy;

pub use handler::{
    handler_fn, FnHandler, HandlerFuture, JobContext, JobHandler, ProgressReporter,
};
pub use stats::EngineStats;

use state::{EngineState, Lifecycle};

/// State shared between the engine handle, worker loops and job contexts.
pub(crate) struct Shared {
    state: Mutex<EngineState>,
    /// Wakes parked workers: new job, resume, handler registered, stop.
    wakeup: Notify,
    /// Fires whenever a job changes status; used by `wait_for`.
    changed: Notify,
    retry_policy: RetryPolicy,
    default_max_retries: u32,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        // Handlers never run under this lock, so a poisoned guard still holds
        // a consistent table.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_attempt(&self, id: &JobId, outcome: Result<JobData, HandlerError>) {
        self.lock()
            .finish_attempt(id, outcome, &self.retry_policy, Instant::now());
        self.wakeup.notify_waiters();
        self.changed.notify_waiters();
    }

    fn record_progress(&self, id: &JobId, update: JobData) {
        self.lock().record_progress(id, update);
    }
}

/// Handle to a job engine instance.
///
/// Call [`JobEngine::stop`] to drain the pool. If the last handle is dropped
/// while the engine is running, the workers finish their current job and exit
/// on their own.
#[derive(Clone)]
pub struct JobEngine {
    shared: Arc<Shared>,
    _owner: Arc<Owner>,
}

/// Dropped together with the last `JobEngine` clone.
struct Owner {
    shared: Arc<Shared>,
}

impl Drop for Owner {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            if state.lifecycle != Lifecycle::Running {
                return;
            }
            state.lifecycle = Lifecycle::Stopped;
            state.generation += 1;
            // Detach; each loop exits once it sees the generation change.
            state.workers.clear();
        }
        self.shared.wakeup.notify_waiters();
        tracing::debug!("last engine handle dropped; retiring workers");
    }
}

impl Default for JobEngine {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), EngineConfig::default().default_max_retries)
    }
}

impl std::fmt::Debug for JobEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEngine")
            .field("retry_policy", &self.shared.retry_policy)
            .field("default_max_retries", &self.shared.default_max_retries)
            .field("stats", &self.get_stats())
            .finish()
    }
}

impl JobEngine {
    /// Create an engine that is accepting jobs but has no workers yet.
    pub fn new(retry_policy: RetryPolicy, default_max_retries: u32) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState::new()),
            wakeup: Notify::new(),
            changed: Notify::new(),
            retry_policy,
            default_max_retries,
        });
        Self {
            _owner: Arc::new(Owner {
                shared: Arc::clone(&shared),
            }),
            shared,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.retry_policy(), cfg.default_max_retries)
    }

    // ---------- admission ----------

    /// Add a job. Fails once `stop()` has been called.
    ///
    /// A job whose type has no handler yet is accepted and stays Pending until
    /// one is registered.
    pub fn enqueue(
        &self,
        job_type: JobType,
        payload: JobData,
        opts: EnqueueOptions,
    ) -> Result<JobId, EngineError> {
        let max_retries = opts.max_retries.unwrap_or(self.shared.default_max_retries);
        let id = {
            let mut state = self.shared.lock();
            if matches!(state.lifecycle, Lifecycle::Stopping | Lifecycle::Stopped) {
                return Err(EngineError::QueueNotRunning);
            }
            if !state.handlers.contains_key(&job_type) {
                tracing::warn!(%job_type, "no handler registered; job will stay pending");
            }
            state.insert_job(job_type, payload, opts.priority, max_retries)
        };
        tracing::debug!(job_id = %id, %job_type, priority = opts.priority, max_retries, "job enqueued");
        self.shared.wakeup.notify_waiters();
        Ok(id)
    }

    /// Register (or replace) the handler for a job type. Jobs already running
    /// keep the handler they were dispatched with.
    pub fn register_handler<H: JobHandler>(&self, job_type: JobType, handler: H) {
        let replaced = self
            .shared
            .lock()
            .handlers
            .insert(job_type, Arc::new(handler))
            .is_some();
        tracing::debug!(%job_type, replaced, "handler registered");
        self.shared.wakeup.notify_waiters();
    }

    /// Register an async closure as the handler for a job type.
    pub fn register_fn<F, Fut>(&self, job_type: JobType, f: F)
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<JobData, HandlerError>> + Send + 'static,
    {
        self.register_handler(job_type, handler_fn(f));
    }

    pub fn has_handler(&self, job_type: JobType) -> bool {
        self.shared.lock().handlers.contains_key(&job_type)
    }

    // ---------- lifecycle ----------

    /// Spawn `num_workers` worker loops on the current tokio runtime.
    ///
    /// No-op if already running. After `stop()` has returned this re-opens
    /// admission and starts a fresh pool; while `stop()` is still draining the
    /// old pool it fails with [`EngineError::Stopping`].
    pub fn start(&self, num_workers: usize) -> Result<(), EngineError> {
        if num_workers == 0 {
            return Err(EngineError::NoWorkers);
        }
        let mut state = self.shared.lock();
        match state.lifecycle {
            Lifecycle::Running => {
                tracing::debug!(workers = state.workers.len(), "engine already running");
                return Ok(());
            }
            Lifecycle::Stopping => return Err(EngineError::Stopping),
            Lifecycle::Idle | Lifecycle::Stopped => {}
        }
        state.lifecycle = Lifecycle::Running;
        state.generation += 1;
        let generation = state.generation;
        for worker_id in 0..num_workers {
            let shared = Arc::clone(&self.shared);
            state
                .workers
                .push(tokio::spawn(worker::run_worker(shared, worker_id, generation)));
        }
        tracing::info!(workers = num_workers, "job engine started");
        Ok(())
    }

    /// Stop accepting jobs and wait for every worker to finish its current
    /// job. Running handlers are never aborted. Idempotent; a call made while
    /// another `stop()` is draining returns at once.
    pub async fn stop(&self) {
        let workers = {
            let mut state = self.shared.lock();
            if matches!(state.lifecycle, Lifecycle::Stopping | Lifecycle::Stopped) {
                return;
            }
            state.lifecycle = Lifecycle::Stopping;
            state.generation += 1;
            std::mem::take(&mut state.workers)
        };
        self.shared.wakeup.notify_waiters();
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::warn!("worker task join: {}", e);
            }
        }
        // Only now may a new pool start.
        self.shared.lock().lifecycle = Lifecycle::Stopped;
        tracing::info!("job engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().lifecycle == Lifecycle::Running
    }

    // ---------- control ----------

    /// Stop workers from starting new jobs. Running jobs continue.
    pub fn pause(&self) {
        self.shared.lock().paused = true;
        tracing::info!("job engine paused");
    }

    pub fn resume(&self) {
        self.shared.lock().paused = false;
        tracing::info!("job engine resumed");
        self.shared.wakeup.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    /// Cancel a job. Returns true if a Pending job was cancelled. For a
    /// Running job the cancel token is raised for the handler to observe and
    /// false is returned.
    pub fn cancel(&self, id: &JobId) -> bool {
        let cancelled = self.shared.lock().cancel(id);
        if cancelled {
            self.shared.changed.notify_waiters();
        }
        cancelled
    }

    /// Remove Completed, Failed and Cancelled records. Returns how many.
    pub fn purge_finished(&self) -> usize {
        let removed = self.shared.lock().purge_finished();
        if removed > 0 {
            tracing::debug!(removed, "purged finished jobs");
        }
        removed
    }

    // ---------- queries ----------

    pub fn get_job(&self, id: &JobId) -> Option<JobSnapshot> {
        self.shared.lock().snapshot(id)
    }

    /// Jobs matching the optional filters, oldest first.
    pub fn list_jobs(&self, status: Option<JobStatus>, job_type: Option<JobType>) -> Vec<JobSnapshot> {
        self.shared.lock().list(status, job_type)
    }

    pub fn get_stats(&self) -> EngineStats {
        self.shared.lock().stats()
    }

    /// Wait until the job reaches a terminal status or `timeout` elapses.
    /// Returns the latest snapshot (`None` for an unknown id).
    pub async fn wait_for(&self, id: &JobId, timeout: Duration) -> Option<JobSnapshot> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let snapshot = self.get_job(id)?;
            if snapshot.status.is_terminal() {
                return Some(snapshot);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.get_job(id);
            }
        }
    }

    /// Wait until no job is Pending-with-a-handler or Running, or `timeout`
    /// elapses. Returns the final stats.
    pub async fn wait_idle(&self, timeout: Duration) -> EngineStats {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let stats = self.get_stats();
            if stats.outstanding() == 0 {
                return stats;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.get_stats();
            }
        }
    }
}
