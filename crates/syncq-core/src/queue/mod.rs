//! Ready-set: Pending jobs ordered by priority (descending) then arrival (FIFO).
//!
//! Entries that are backing off after a failed attempt stay in the set with a
//! `not_before` instant and are skipped until it passes. Entries whose job type
//! has no registered handler are skipped as well and keep their position.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use tokio::time::Instant;

use crate::job::{JobId, JobType};

/// Sort key of a ready entry. Smaller keys are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ReadyKey {
    priority: Reverse<i32>,
    arrival: u64,
}

#[derive(Debug, Clone)]
struct ReadyEntry {
    id: JobId,
    job_type: JobType,
    not_before: Option<Instant>,
}

/// Outcome of a dequeue attempt.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Dequeue {
    /// A job was removed from the set and is ready to run.
    Ready(JobId),
    /// Nothing runnable now. `Some(t)` is the earliest instant a backing-off
    /// entry becomes eligible.
    Empty(Option<Instant>),
}

#[derive(Debug, Default)]
pub(crate) struct ReadySet {
    entries: BTreeMap<ReadyKey, ReadyEntry>,
    next_arrival: u64,
}

impl ReadySet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a job; each call takes a fresh arrival position.
    pub(crate) fn push(
        &mut self,
        id: JobId,
        job_type: JobType,
        priority: i32,
        not_before: Option<Instant>,
    ) -> ReadyKey {
        let key = ReadyKey {
            priority: Reverse(priority),
            arrival: self.next_arrival,
        };
        self.next_arrival += 1;
        self.entries.insert(
            key,
            ReadyEntry {
                id,
                job_type,
                not_before,
            },
        );
        key
    }

    pub(crate) fn remove(&mut self, key: &ReadyKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return the first entry in order that is eligible at `now`
    /// and whose type satisfies `runnable`.
    pub(crate) fn pop_eligible(
        &mut self,
        now: Instant,
        runnable: impl Fn(JobType) -> bool,
    ) -> Dequeue {
        let mut earliest: Option<Instant> = None;
        let mut found: Option<ReadyKey> = None;

        for (key, entry) in &self.entries {
            if !runnable(entry.job_type) {
                continue;
            }
            match entry.not_before {
                Some(t) if t > now => {
                    earliest = Some(earliest.map_or(t, |e| e.min(t)));
                }
                _ => {
                    found = Some(*key);
                    break;
                }
            }
        }

        match found.and_then(|key| self.entries.remove(&key)) {
            Some(entry) => Dequeue::Ready(entry.id),
            None => Dequeue::Empty(earliest),
        }
    }
}
