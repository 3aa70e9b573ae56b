//! In-memory stand-ins for the handler collaborators.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use syncq_core::handlers::{MetadataClient, SearchClient, TokenManager};
use syncq_core::selection::Candidate;
use syncq_core::{job_data, JobData, JobType};

/// Returns a fixed result list and remembers what was downloaded.
#[derive(Default)]
pub struct FakeSearch {
    pub results: Vec<Candidate>,
    pub downloads: Mutex<Vec<(String, String)>>,
    pub searches: AtomicU32,
}

impl FakeSearch {
    pub fn with_results(results: Vec<Candidate>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SearchClient for FakeSearch {
    async fn search(&self, _query: &str, _timeout: Duration) -> anyhow::Result<Vec<Candidate>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }

    async fn download(&self, username: &str, filename: &str) -> anyhow::Result<String> {
        let mut downloads = self.downloads.lock().unwrap();
        downloads.push((username.to_string(), filename.to_string()));
        Ok(format!("transfer-{}", downloads.len()))
    }
}

/// Echoes the job type and the payload's `track_id`.
pub struct FakeMetadata;

#[async_trait]
impl MetadataClient for FakeMetadata {
    async fn enrich(&self, job_type: JobType, payload: &JobData) -> anyhow::Result<JobData> {
        let Some(track_id) = payload.get("track_id") else {
            anyhow::bail!("track_id missing");
        };
        Ok(job_data(json!({
            "source": job_type.as_str(),
            "track_id": track_id,
            "genre": "idm",
        })))
    }
}

/// Yields a token only after `fail_first` calls.
pub struct FlakyTokens {
    pub fail_first: u32,
    pub calls: AtomicU32,
}

impl FlakyTokens {
    pub fn new(fail_first: u32) -> Self {
        Self {
            fail_first,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TokenManager for FlakyTokens {
    async fn get_valid_token(&self) -> Option<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (call > self.fail_first).then(|| "access-token".to_string())
    }
}
