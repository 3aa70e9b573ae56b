//! syncq: an in-process prioritized background job engine for a music
//! library manager, plus the built-in handlers (download, metadata, library
//! scan, token refresh) and their file-selection logic.

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod job;
pub mod logging;
mod queue;
pub mod retry;
pub mod selection;

pub use engine::{handler_fn, EngineStats, JobContext, JobEngine, JobHandler};
pub use error::{EngineError, HandlerError, HandlerResult};
pub use job::{job_data, EnqueueOptions, JobData, JobId, JobSnapshot, JobStatus, JobType};
