//! Built-in job handlers and the collaborator traits they call.
//!
//! The engine knows nothing about these; they are ordinary [`JobHandler`]s
//! that an application registers at startup. Network clients, metadata
//! services and token storage are supplied by the application through the
//! traits below.
//!
//! [`JobHandler`]: crate::engine::JobHandler

mod download;
mod library_scan;
mod metadata;
mod token_refresh;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::control::CancelToken;
use crate::job::{JobData, JobType};
use crate::selection::Candidate;

pub use download::DownloadHandler;
pub use library_scan::{FsLibraryScanner, LibraryScanHandler, ScanSummary};
pub use metadata::MetadataHandler;
pub use token_refresh::TokenRefreshHandler;

/// Remote file search and transfer service.
#[async_trait]
pub trait SearchClient: Send + Sync + 'static {
    /// Search for files matching `query`; the client enforces `timeout`.
    async fn search(&self, query: &str, timeout: Duration) -> anyhow::Result<Vec<Candidate>>;

    /// Start downloading `filename` from `username`. Returns a transfer id.
    async fn download(&self, username: &str, filename: &str) -> anyhow::Result<String>;
}

/// Metadata lookup service (tags, artwork, external ids).
#[async_trait]
pub trait MetadataClient: Send + Sync + 'static {
    /// Look up metadata for the job payload. The returned map becomes the job result.
    async fn enrich(&self, job_type: JobType, payload: &JobData) -> anyhow::Result<JobData>;
}

/// Progress callback used by library scanners: number of audio files seen so far.
pub type ScanProgress = Box<dyn Fn(u64) + Send + Sync>;

/// Walks a music library.
#[async_trait]
pub trait LibraryScanner: Send + Sync + 'static {
    /// Scan `root`, calling `progress` periodically. Stops early (with
    /// `cancelled = true` in the summary) once `cancel` is raised.
    async fn scan(
        &self,
        root: &Path,
        progress: ScanProgress,
        cancel: CancelToken,
    ) -> anyhow::Result<ScanSummary>;
}

/// Supplies access tokens for external APIs.
#[async_trait]
pub trait TokenManager: Send + Sync + 'static {
    /// A valid token, refreshing it if needed; `None` when none can be obtained.
    async fn get_valid_token(&self) -> Option<String>;
}
