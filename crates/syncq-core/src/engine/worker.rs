//! Worker loop: one job in flight per loop, so the pool size is the
//! concurrency ceiling.
//!
//! Each loop parks on the engine's wakeup notification while there is nothing
//! to run (paused, empty ready-set, or only backing-off / unhandled jobs) and
//! exits after its current job once the pool it belongs to is stopped.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;

use crate::error::HandlerError;

use super::handler::JobContext;
use super::state::{Claim, Claimed};
use super::Shared;

pub(super) async fn run_worker(shared: Arc<Shared>, worker_id: usize, generation: u64) {
    tracing::debug!(worker_id, generation, "worker started");
    while let Some(claimed) = next_job(&shared, generation).await {
        execute(&shared, worker_id, claimed).await;
    }
    tracing::debug!(worker_id, generation, "worker exiting");
}

/// Wait for the next runnable job. `None` when this loop should exit.
async fn next_job(shared: &Arc<Shared>, generation: u64) -> Option<Claimed> {
    loop {
        // Register interest before inspecting state so a notify between the
        // check and the await is not lost.
        let notified = shared.wakeup.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let wake_at = {
            let mut state = shared.lock();
            if !state.is_current(generation) {
                return None;
            }
            if state.paused {
                None
            } else {
                match state.claim_next(Instant::now()) {
                    Claim::Job(claimed) => return Some(claimed),
                    Claim::Wait(wake_at) => wake_at,
                }
            }
        };

        match wake_at {
            Some(at) => {
                tokio::select! {
                    _ = &mut notified => {}
                    _ = tokio::time::sleep_until(at) => {}
                }
            }
            None => notified.await,
        }
    }
}

async fn execute(shared: &Arc<Shared>, worker_id: usize, claimed: Claimed) {
    let Claimed {
        id,
        job_type,
        payload,
        priority,
        attempt,
        handler,
        cancel,
    } = claimed;

    let span = tracing::info_span!("job", job_id = %id, %job_type, attempt, worker_id);
    tracing::debug!(parent: &span, priority, "job started");

    let ctx = JobContext::new(
        id.clone(),
        job_type,
        payload,
        priority,
        attempt,
        cancel,
        Arc::clone(shared),
    );
    let fut = handler.handle(ctx).instrument(span.clone());

    // Run the handler as its own task so a panic is contained; the worker
    // still waits for it, keeping one job per slot.
    let outcome = match tokio::spawn(fut).await {
        Ok(outcome) => outcome,
        Err(join_err) => Err(HandlerError::failed(format!(
            "handler panicked: {join_err}"
        ))),
    };

    shared.finish_attempt(&id, outcome);
}
