//! Library scan handler and a local filesystem scanner.
//!
//! Payload: `{ "path": str }`. Progress: `{ "audio_files": n }` every
//! `PROGRESS_EVERY` files. Result: the `ScanSummary` fields.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use walkdir::WalkDir;

use crate::control::CancelToken;
use crate::engine::{HandlerFuture, JobContext, JobHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::job::{job_data, JobData};
use crate::selection::is_audio_filename;

use super::{LibraryScanner, ScanProgress};

const PROGRESS_EVERY: u64 = 100;

/// What a library scan found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub files_seen: u64,
    pub audio_files: u64,
    pub directories: u64,
    /// Entries that could not be read, e.g. directories without permission.
    pub unreadable: u64,
    /// Stopped early because cancellation was requested.
    pub cancelled: bool,
}

pub struct LibraryScanHandler<L> {
    scanner: Arc<L>,
}

impl<L: LibraryScanner> LibraryScanHandler<L> {
    pub fn new(scanner: Arc<L>) -> Self {
        Self { scanner }
    }
}

impl<L: LibraryScanner> JobHandler for LibraryScanHandler<L> {
    fn handle(&self, ctx: JobContext) -> HandlerFuture {
        let scanner = Arc::clone(&self.scanner);
        Box::pin(async move { scan_library(scanner.as_ref(), &ctx).await })
    }
}

async fn scan_library<L: LibraryScanner>(scanner: &L, ctx: &JobContext) -> HandlerResult<JobData> {
    let root = PathBuf::from(ctx.payload_str("path")?);
    let reporter = ctx.progress_reporter();
    let progress: ScanProgress = Box::new(move |audio_files| {
        reporter.report(job_data(json!({ "audio_files": audio_files })));
    });

    let summary = scanner.scan(&root, progress, ctx.cancel_token()).await?;
    if summary.cancelled {
        return Err(HandlerError::Cancelled);
    }
    tracing::info!(
        path = %root.display(),
        audio_files = summary.audio_files,
        files_seen = summary.files_seen,
        "library scan finished"
    );
    let value = serde_json::to_value(&summary).context("serialize scan summary")?;
    Ok(job_data(value))
}

/// Counts audio files under a local directory tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLibraryScanner;

#[async_trait]
impl LibraryScanner for FsLibraryScanner {
    async fn scan(
        &self,
        root: &Path,
        progress: ScanProgress,
        cancel: CancelToken,
    ) -> anyhow::Result<ScanSummary> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || walk(&root, &progress, &cancel))
            .await
            .context("scan task join")?
    }
}

fn walk(root: &Path, progress: &ScanProgress, cancel: &CancelToken) -> anyhow::Result<ScanSummary> {
    let meta = fs::metadata(root).with_context(|| format!("library path {}", root.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("library path is not a directory: {}", root.display());
    }

    let mut summary = ScanSummary::default();
    // Links are reported as links and never descended into.
    for entry in WalkDir::new(root).follow_links(false) {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("skip unreadable entry: {}", e);
                summary.unreadable += 1;
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            summary.directories += 1;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        summary.files_seen += 1;
        if is_audio_filename(&entry.file_name().to_string_lossy()) {
            summary.audio_files += 1;
            if summary.audio_files % PROGRESS_EVERY == 0 {
                progress(summary.audio_files);
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[tokio::test]
    async fn counts_audio_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Artist/Album/01.flac"));
        touch(&dir.path().join("Artist/Album/02.MP3"));
        touch(&dir.path().join("Artist/Album/cover.jpg"));
        touch(&dir.path().join("loose.ogg"));

        let summary = FsLibraryScanner
            .scan(dir.path(), Box::new(|_| {}), CancelToken::new())
            .await
            .unwrap();
        assert_eq!(summary.audio_files, 3);
        assert_eq!(summary.files_seen, 4);
        assert_eq!(summary.directories, 3);
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn reports_progress_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..250 {
            touch(&dir.path().join(format!("t{i:03}.mp3")));
        }
        let calls = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&calls);
        let summary = FsLibraryScanner
            .scan(
                dir.path(),
                Box::new(move |_| {
                    seen.fetch_add(1, Ordering::Relaxed);
                }),
                CancelToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(summary.audio_files, 250);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/x.mp3"));
        let cancel = CancelToken::new();
        cancel.cancel();
        let summary = FsLibraryScanner
            .scan(dir.path(), Box::new(|_| {}), cancel)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.audio_files, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_are_neither_followed_nor_counted() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        touch(&outside.path().join("elsewhere.flac"));
        touch(&dir.path().join("Album/01.flac"));
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("Album/01.flac"), dir.path().join("alias.flac"))
            .unwrap();

        let summary = FsLibraryScanner
            .scan(dir.path(), Box::new(|_| {}), CancelToken::new())
            .await
            .unwrap();
        assert_eq!(summary.files_seen, 1);
        assert_eq!(summary.audio_files, 1);
        assert_eq!(summary.directories, 2);
        assert_eq!(summary.unreadable, 0);
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsLibraryScanner
            .scan(&dir.path().join("nope"), Box::new(|_| {}), CancelToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("library path"));
    }
}
