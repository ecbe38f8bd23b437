//! The download loop: map, skip what exists, fetch the rest, pace.

use super::fetch::{discard, part_path, Downloader};
use super::path_mapper::PathMapper;
use crate::discovery::url_list::RejectedLine;
use crate::pacing::DelayRange;
use crate::retry::RetryOutcome;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

/// Directories and files shown in the layout preview.
const PREVIEW_DIRS: usize = 10;
const PREVIEW_FILES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Downloaded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadJob {
    pub url: String,
    pub directory: PathBuf,
    pub filename: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub bytes: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectoryPreview {
    /// Relative to the download root; empty for the root itself.
    pub directory: PathBuf,
    pub files: Vec<String>,
    /// Files in the directory beyond those listed.
    pub more: usize,
}

/// What is on disk under the download root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeSummary {
    pub files: usize,
    pub total_bytes: u64,
    pub directories: usize,
    pub preview: Vec<DirectoryPreview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub output_dir: PathBuf,
    pub jobs: Vec<DownloadJob>,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_written: u64,
    pub rejected_lines: Vec<RejectedLine>,
    pub interrupted: bool,
    pub elapsed_ms: u64,
    pub tree: TreeSummary,
}

impl DownloadReport {
    pub fn failed_jobs(&self) -> impl Iterator<Item = &DownloadJob> {
        self.jobs.iter().filter(|j| j.status == JobStatus::Failed)
    }
}

pub struct DownloadEngine {
    downloader: Downloader,
    mapper: PathMapper,
    output_dir: PathBuf,
    job_delay: DelayRange,
    shutdown: Option<Arc<Notify>>,
}

impl DownloadEngine {
    pub fn new(
        downloader: Downloader,
        mapper: PathMapper,
        output_dir: impl Into<PathBuf>,
        job_delay: DelayRange,
    ) -> Self {
        Self {
            downloader,
            mapper,
            output_dir: output_dir.into(),
            job_delay,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: Arc<Notify>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Process `urls` in order. Files already present are skipped without a
    /// request, so a re-run only fetches what is missing.
    pub async fn run(&self, urls: &[String]) -> DownloadReport {
        let start = Instant::now();
        let total = urls.len();
        let mut jobs = Vec::with_capacity(total);
        let mut interrupted = false;

        for (i, url) in urls.iter().enumerate() {
            let mirrored = self.mapper.map(url);
            let target = mirrored.under(&self.output_dir);
            let mut job = DownloadJob {
                url: url.clone(),
                directory: mirrored.directory.clone(),
                filename: mirrored.filename.clone(),
                status: JobStatus::Skipped,
                attempts: 0,
                bytes: 0,
                error: None,
            };

            if target.exists() {
                tracing::info!("[{}/{total}] exists, skipping {}", i + 1, job.filename);
                jobs.push(job);
                continue;
            }

            tracing::info!("[{}/{total}] downloading {url}", i + 1);
            let Some(outcome) = self.interruptible(self.downloader.download(url, &target)).await
            else {
                discard(&part_path(&target)).await;
                interrupted = true;
                break;
            };

            job.attempts = outcome.attempts();
            match outcome {
                RetryOutcome::Succeeded { value, .. } => {
                    tracing::info!("saved {} ({value} bytes)", mirrored.relative_path().display());
                    job.status = JobStatus::Downloaded;
                    job.bytes = value;
                }
                RetryOutcome::Exhausted { last_error, .. } => {
                    let error = last_error.map(|e| e.to_string()).unwrap_or_default();
                    tracing::warn!("giving up on {url}: {error}");
                    job.status = JobStatus::Failed;
                    job.error = Some(error);
                }
                RetryOutcome::Aborted { error, .. } => {
                    tracing::warn!("skipping {url}: {error}");
                    job.status = JobStatus::Failed;
                    job.error = Some(error.to_string());
                }
            }
            jobs.push(job);

            if i + 1 < total && self.interruptible(self.job_delay.pause()).await.is_none() {
                interrupted = true;
                break;
            }
        }

        if interrupted {
            tracing::warn!("download interrupted after {} of {total} jobs", jobs.len());
        }

        let count = |s: JobStatus| jobs.iter().filter(|j| j.status == s).count();
        DownloadReport {
            output_dir: self.output_dir.clone(),
            downloaded: count(JobStatus::Downloaded),
            skipped: count(JobStatus::Skipped),
            failed: count(JobStatus::Failed),
            bytes_written: jobs.iter().map(|j| j.bytes).sum(),
            rejected_lines: Vec::new(),
            interrupted,
            elapsed_ms: start.elapsed().as_millis() as u64,
            tree: summarize_tree(&self.output_dir),
            jobs,
        }
    }

    async fn interruptible<F: std::future::Future>(&self, fut: F) -> Option<F::Output> {
        match &self.shutdown {
            Some(shutdown) => tokio::select! {
                biased;
                _ = shutdown.notified() => None,
                out = fut => Some(out),
            },
            None => Some(fut.await),
        }
    }
}

/// Count files and bytes under `root` and sample its layout.
pub fn summarize_tree(root: &Path) -> TreeSummary {
    let mut summary = TreeSummary::default();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                subdirs.push(entry.path());
            } else if meta.is_file() {
                summary.files += 1;
                summary.total_bytes += meta.len();
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        if !files.is_empty() {
            summary.directories += 1;
            files.sort();
            let relative = dir.strip_prefix(root).unwrap_or(&dir).to_path_buf();
            summary.preview.push(DirectoryPreview {
                directory: relative,
                more: files.len().saturating_sub(PREVIEW_FILES),
                files: files.into_iter().take(PREVIEW_FILES).collect(),
            });
        }

        subdirs.sort();
        pending.extend(subdirs.into_iter().rev());
    }

    summary.preview.sort_by(|a, b| a.directory.cmp(&b.directory));
    summary.preview.truncate(PREVIEW_DIRS);
    summary
}
