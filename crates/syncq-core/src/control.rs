//! Cooperative cancellation for running jobs, plus the control socket location.
//!
//! Each running job is registered with a cancel token when a worker claims
//! it. `cancel` on a running job raises the token; the handler sees it through
//! its `JobContext` and decides when to stop. Nothing is ever aborted by force.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::job::JobId;

/// Shared flag a handler polls to learn it has been asked to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Registry of job id -> cancel token for jobs that are currently running.
///
/// Lives inside the engine state and is only touched under the engine lock.
#[derive(Debug, Default)]
pub(crate) struct CancelRegistry {
    running: HashMap<JobId, CancelToken>,
}

impl CancelRegistry {
    /// Register a running job; returns the token to hand to its handler.
    pub(crate) fn register(&mut self, job_id: &JobId) -> CancelToken {
        let token = CancelToken::new();
        self.running.insert(job_id.clone(), token.clone());
        token
    }

    /// Unregister a job once its attempt finishes, whatever the outcome.
    pub(crate) fn unregister(&mut self, job_id: &JobId) {
        self.running.remove(job_id);
    }

    /// Raise the token for a running job. Returns false if it is not running.
    pub(crate) fn request_cancel(&self, job_id: &JobId) -> bool {
        match self.running.get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_cancel_requested(&self, job_id: &JobId) -> bool {
        self.running
            .get(job_id)
            .map(CancelToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// Default path for the control socket (XDG state dir).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("syncq")?.get_state_home();
    Ok(dir.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reaches_registered_token() {
        let mut reg = CancelRegistry::default();
        let id = JobId::from("a");
        let token = reg.register(&id);
        assert!(!token.is_cancelled());
        assert!(reg.request_cancel(&id));
        assert!(token.is_cancelled());
        assert!(reg.is_cancel_requested(&id));

        reg.unregister(&id);
        assert!(!reg.request_cancel(&id));
        assert!(!reg.is_cancel_requested(&id));
    }
}
