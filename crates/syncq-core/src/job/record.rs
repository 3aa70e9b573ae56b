//! Mutable job record held in the engine's job table.
//!
//! Every transition goes through a method here so the state machine lives in
//! one place:
//!
//! ```text
//! Pending -> Running -> Completed | Failed | Cancelled
//!               \-> Pending (retry)
//! Pending -> Cancelled
//! ```

use chrono::{DateTime, Utc};

use super::types::{JobData, JobId, JobSnapshot, JobStatus, JobType};
use crate::queue::ReadyKey;

#[derive(Debug, Clone)]
pub(crate) struct JobRecord {
    pub(crate) job: JobSnapshot,
    /// Creation order; `list_jobs` sorts on this.
    pub(crate) seq: u64,
    /// Position in the ready-set while Pending.
    pub(crate) ready_key: Option<ReadyKey>,
}

impl JobRecord {
    pub(crate) fn new(
        id: JobId,
        job_type: JobType,
        payload: JobData,
        priority: i32,
        max_retries: u32,
        seq: u64,
    ) -> Self {
        Self {
            job: JobSnapshot {
                id,
                job_type,
                payload,
                priority,
                status: JobStatus::Pending,
                attempt_count: 0,
                max_retries,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
                result: JobData::new(),
                error: None,
            },
            seq,
            ready_key: None,
        }
    }

    pub(crate) fn status(&self) -> JobStatus {
        self.job.status
    }

    /// Pending -> Running. Counts the attempt.
    pub(crate) fn begin_attempt(&mut self, now: DateTime<Utc>) {
        debug_assert_eq!(self.job.status, JobStatus::Pending);
        self.job.status = JobStatus::Running;
        self.job.started_at.get_or_insert(now);
        self.job.attempt_count += 1;
        self.ready_key = None;
    }

    /// Whether another attempt is allowed after the current one failed.
    pub(crate) fn has_attempts_left(&self) -> bool {
        self.job.attempt_count <= self.job.max_retries
    }

    /// Merge handler-reported keys into `result`.
    pub(crate) fn merge_result(&mut self, update: JobData) {
        for (k, v) in update {
            self.job.result.insert(k, v);
        }
    }

    /// Running -> Completed. `error` from an earlier attempt is kept.
    pub(crate) fn complete(&mut self, output: JobData) {
        debug_assert_eq!(self.job.status, JobStatus::Running);
        self.merge_result(output);
        self.job.status = JobStatus::Completed;
        self.job.completed_at = Some(Utc::now());
    }

    /// Running -> Pending after a failed attempt.
    pub(crate) fn requeue(&mut self, error: String) {
        debug_assert_eq!(self.job.status, JobStatus::Running);
        debug_assert!(self.has_attempts_left());
        self.job.status = JobStatus::Pending;
        self.job.error = Some(error);
    }

    /// Running -> Failed.
    pub(crate) fn fail(&mut self, error: String) {
        debug_assert_eq!(self.job.status, JobStatus::Running);
        self.job.status = JobStatus::Failed;
        self.job.error = Some(error);
        self.job.completed_at = Some(Utc::now());
    }

    /// Pending or Running -> Cancelled.
    pub(crate) fn cancel(&mut self, reason: Option<String>) {
        debug_assert!(!self.job.status.is_terminal());
        self.job.status = JobStatus::Cancelled;
        if reason.is_some() {
            self.job.error = reason;
        }
        self.job.completed_at = Some(Utc::now());
        self.ready_key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(max_retries: u32) -> JobRecord {
        JobRecord::new(
            JobId::from("job-1"),
            JobType::Download,
            JobData::new(),
            0,
            max_retries,
            0,
        )
    }

    #[test]
    fn attempt_accounting_matches_retry_budget() {
        let mut r = record(2);
        for attempt in 1..=2 {
            r.begin_attempt(Utc::now());
            assert_eq!(r.job.attempt_count, attempt);
            assert!(r.has_attempts_left());
            r.requeue(format!("boom {attempt}"));
            assert_eq!(r.status(), JobStatus::Pending);
        }
        r.begin_attempt(Utc::now());
        assert_eq!(r.job.attempt_count, 3);
        assert!(!r.has_attempts_left());
        r.fail("boom 3".into());
        assert_eq!(r.status(), JobStatus::Failed);
        assert_eq!(r.job.error.as_deref(), Some("boom 3"));
        assert!(r.job.completed_at.is_some());
    }

    #[test]
    fn started_at_is_set_once() {
        let mut r = record(1);
        let first = Utc::now();
        r.begin_attempt(first);
        r.requeue("x".into());
        r.begin_attempt(first + chrono::Duration::seconds(5));
        assert_eq!(r.job.started_at, Some(first));
    }

    #[test]
    fn complete_merges_over_progress() {
        let mut r = record(0);
        r.begin_attempt(Utc::now());
        let mut progress = JobData::new();
        progress.insert("stage".into(), "searching".into());
        progress.insert("percent".into(), 10.into());
        r.merge_result(progress);
        let mut out = JobData::new();
        out.insert("percent".into(), 100.into());
        r.complete(out);
        assert_eq!(r.job.result["stage"], "searching");
        assert_eq!(r.job.result["percent"], 100);
        assert_eq!(r.status(), JobStatus::Completed);
    }
}
