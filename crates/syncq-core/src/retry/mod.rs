//! Retry and backoff policy.
//!
//! The worker pool consults this after every handler failure to decide between
//! re-queueing the job (after a delay) and marking it Failed.

mod policy;

pub use policy::{BackoffStrategy, RetryDecision, RetryPolicy};
