//! Error types surfaced by the engine and returned by job handlers.

use thiserror::Error;

/// Errors returned synchronously by engine calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `enqueue` after `stop()`.
    #[error("job queue is not running (engine stopped)")]
    QueueNotRunning,

    /// `start(0)`.
    #[error("worker pool needs at least one worker")]
    NoWorkers,

    /// `start()` while `stop()` is still waiting for the previous pool.
    #[error("job engine is still stopping")]
    Stopping,
}

/// Error returned by a handler for one attempt.
///
/// Every variant except `Cancelled` goes through the retry policy.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler observed its cancel token and stopped.
    #[error("job cancelled")]
    Cancelled,

    /// The handler could not do its work.
    #[error("{0}")]
    Failed(String),

    /// The payload lacks a field or has the wrong shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;
