//! Everything the engine lock protects: job table, ready-set, handler map,
//! cancel tokens, pause flag and worker lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::control::{CancelRegistry, CancelToken};
use crate::error::HandlerError;
use crate::job::record::JobRecord;
use crate::job::{JobData, JobId, JobSnapshot, JobStatus, JobType};
use crate::queue::{Dequeue, ReadySet};
use crate::retry::{RetryDecision, RetryPolicy};

use super::handler::JobHandler;
use super::stats::EngineStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Lifecycle {
    /// Never started; enqueue is accepted and jobs wait.
    Idle,
    Running,
    /// `stop()` is joining the previous pool; a new pool may not start yet.
    Stopping,
    Stopped,
}

/// A job a worker has just moved to Running.
pub(super) struct Claimed {
    pub(super) id: JobId,
    pub(super) job_type: JobType,
    pub(super) payload: JobData,
    pub(super) priority: i32,
    pub(super) attempt: u32,
    pub(super) handler: Arc<dyn JobHandler>,
    pub(super) cancel: CancelToken,
}

pub(super) enum Claim {
    Job(Claimed),
    /// Nothing to run; `Some(t)` is when a backing-off job becomes eligible.
    Wait(Option<Instant>),
}

pub(super) struct EngineState {
    pub(super) jobs: HashMap<JobId, JobRecord>,
    pub(super) ready: ReadySet,
    pub(super) handlers: HashMap<JobType, Arc<dyn JobHandler>>,
    pub(super) cancels: CancelRegistry,
    pub(super) paused: bool,
    pub(super) lifecycle: Lifecycle,
    /// Bumped on every start/stop so loops from an earlier pool exit.
    pub(super) generation: u64,
    pub(super) workers: Vec<JoinHandle<()>>,
    next_seq: u64,
}

impl EngineState {
    pub(super) fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            ready: ReadySet::new(),
            handlers: HashMap::new(),
            cancels: CancelRegistry::default(),
            paused: false,
            lifecycle: Lifecycle::Idle,
            generation: 0,
            workers: Vec::new(),
            next_seq: 0,
        }
    }

    pub(super) fn is_current(&self, generation: u64) -> bool {
        self.lifecycle == Lifecycle::Running && self.generation == generation
    }

    pub(super) fn insert_job(
        &mut self,
        job_type: JobType,
        payload: JobData,
        priority: i32,
        max_retries: u32,
    ) -> JobId {
        let id = JobId::generate();
        let mut record = JobRecord::new(id.clone(), job_type, payload, priority, max_retries, self.next_seq);
        self.next_seq += 1;
        record.ready_key = Some(self.ready.push(id.clone(), job_type, priority, None));
        self.jobs.insert(id.clone(), record);
        id
    }

    /// Move the next eligible job with a registered handler to Running.
    pub(super) fn claim_next(&mut self, now: Instant) -> Claim {
        let handlers = &self.handlers;
        let id = match self.ready.pop_eligible(now, |t| handlers.contains_key(&t)) {
            Dequeue::Ready(id) => id,
            Dequeue::Empty(wake_at) => return Claim::Wait(wake_at),
        };
        let Some(record) = self.jobs.get_mut(&id) else {
            // Ready entries are removed together with their record; treat a
            // stray one as nothing to do and let the caller loop.
            return Claim::Wait(Some(now));
        };
        let Some(handler) = self.handlers.get(&record.job.job_type).cloned() else {
            return Claim::Wait(Some(now));
        };

        record.begin_attempt(Utc::now());
        let cancel = self.cancels.register(&id);
        Claim::Job(Claimed {
            id,
            job_type: record.job.job_type,
            payload: record.job.payload.clone(),
            priority: record.job.priority,
            attempt: record.job.attempt_count,
            handler,
            cancel,
        })
    }

    /// Apply the outcome of one handler invocation.
    pub(super) fn finish_attempt(
        &mut self,
        id: &JobId,
        outcome: Result<JobData, HandlerError>,
        policy: &RetryPolicy,
        now: Instant,
    ) {
        let cancel_requested = self.cancels.is_cancel_requested(id);
        self.cancels.unregister(id);
        let Some(record) = self.jobs.get_mut(id) else {
            tracing::warn!(job_id = %id, "finished job missing from table");
            return;
        };
        let job_type = record.job.job_type;
        let attempt = record.job.attempt_count;

        match outcome {
            Ok(output) => {
                record.complete(output);
                tracing::info!(job_id = %id, %job_type, attempt, "job completed");
            }
            Err(HandlerError::Cancelled) => {
                record.cancel(None);
                tracing::info!(job_id = %id, %job_type, attempt, "job cancelled by handler");
            }
            Err(err) if cancel_requested => {
                record.cancel(Some(err.to_string()));
                tracing::info!(job_id = %id, %job_type, attempt, error = %err, "job cancelled while running");
            }
            Err(err) => match policy.decide(attempt, record.job.max_retries) {
                RetryDecision::RetryAfter(delay) => {
                    record.requeue(err.to_string());
                    let not_before = (!delay.is_zero()).then(|| now + delay);
                    record.ready_key =
                        Some(self.ready.push(id.clone(), job_type, record.job.priority, not_before));
                    tracing::warn!(
                        job_id = %id,
                        %job_type,
                        attempt,
                        max_retries = record.job.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "job attempt failed; retrying"
                    );
                }
                RetryDecision::NoRetry => {
                    record.fail(err.to_string());
                    tracing::warn!(
                        job_id = %id,
                        %job_type,
                        attempt,
                        error = %err,
                        "job failed; retries exhausted"
                    );
                }
            },
        }
    }

    /// Cancel a Pending job, or signal a Running one. True only for Pending.
    pub(super) fn cancel(&mut self, id: &JobId) -> bool {
        let Some(record) = self.jobs.get_mut(id) else {
            return false;
        };
        match record.status() {
            JobStatus::Pending => {
                if let Some(key) = record.ready_key.take() {
                    self.ready.remove(&key);
                }
                record.cancel(None);
                tracing::info!(job_id = %id, "pending job cancelled");
                true
            }
            JobStatus::Running => {
                self.cancels.request_cancel(id);
                tracing::info!(job_id = %id, "cancellation requested for running job");
                false
            }
            _ => false,
        }
    }

    pub(super) fn record_progress(&mut self, id: &JobId, update: JobData) {
        if let Some(record) = self.jobs.get_mut(id) {
            if record.status() == JobStatus::Running {
                record.merge_result(update);
            }
        }
    }

    pub(super) fn snapshot(&self, id: &JobId) -> Option<JobSnapshot> {
        self.jobs.get(id).map(|r| r.job.clone())
    }

    pub(super) fn list(&self, status: Option<JobStatus>, job_type: Option<JobType>) -> Vec<JobSnapshot> {
        let mut records: Vec<&JobRecord> = self
            .jobs
            .values()
            .filter(|r| status.map_or(true, |s| r.job.status == s))
            .filter(|r| job_type.map_or(true, |t| r.job.job_type == t))
            .collect();
        records.sort_by_key(|r| r.seq);
        records.into_iter().map(|r| r.job.clone()).collect()
    }

    pub(super) fn stats(&self) -> EngineStats {
        let mut stats = EngineStats {
            total: self.jobs.len(),
            queue_size: self.ready.len(),
            ..EngineStats::default()
        };
        for record in self.jobs.values() {
            match record.status() {
                JobStatus::Pending => {
                    stats.pending += 1;
                    if !self.handlers.contains_key(&record.job.job_type) {
                        stats.unhandled += 1;
                    }
                }
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Drop terminal records. Returns how many were removed.
    pub(super) fn purge_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, r| !r.status().is_terminal());
        before - self.jobs.len()
    }
}
