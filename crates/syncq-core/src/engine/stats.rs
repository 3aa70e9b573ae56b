//! Aggregate counts for dashboards and the `status` command.

use serde::{Deserialize, Serialize};

/// Snapshot of job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Entries in the ready-set (Pending jobs, including ones backing off).
    pub queue_size: usize,
    /// Pending jobs whose type has no registered handler.
    pub unhandled: usize,
}

impl EngineStats {
    /// Pending or Running jobs that a registered handler will pick up.
    pub fn outstanding(&self) -> usize {
        (self.pending - self.unhandled) + self.running
    }

    /// Completed + failed + cancelled.
    pub fn finished(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }
}
