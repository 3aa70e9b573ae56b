//! Shared helpers for the engine integration tests.

#![allow(dead_code)]

pub mod gate;
pub mod mocks;

use std::time::Duration;

use syncq_core::retry::RetryPolicy;
use syncq_core::JobEngine;

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Engine with immediate retries and the given default retry budget.
pub fn engine(default_max_retries: u32) -> JobEngine {
    JobEngine::new(RetryPolicy::immediate(), default_max_retries)
}
