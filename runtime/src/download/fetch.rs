//! Download one image with bounded retries.
//!
//! The body streams into `<target>.part`, which is renamed onto the target
//! only once it is known to be non-empty. Transport and HTTP status errors
//! are retried; a non-image content type, an empty body or a local I/O
//! error ends the job at once.

use crate::acquisition::headers::HeaderConfig;
use crate::acquisition::http_client::{content_type, HttpClient};
use crate::config::DownloadConfig;
use crate::retry::{RetryOutcome, RetryPolicy};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("not an image (content-type: {})", .0.as_deref().unwrap_or("missing"))]
    NotAnImage(Option<String>),

    #[error("empty response body")]
    EmptyBody,

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::HttpStatus(_))
    }
}

/// True for `image/*` and `application/octet-stream`.
pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.contains("image/") || ct.contains("application/octet-stream"))
        .unwrap_or(false)
}

/// The temporary file a download streams into.
pub fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

pub struct Downloader {
    http: HttpClient,
    headers: HeaderConfig,
    retry: RetryPolicy,
    timeout_ms: u64,
    chunk_size: usize,
}

impl Downloader {
    pub fn new(http: HttpClient, headers: HeaderConfig, config: &DownloadConfig) -> Self {
        Self {
            http,
            headers,
            retry: config.retry.clone(),
            timeout_ms: config.timeout_ms,
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// Fetch `url` into `target`. Succeeds with the number of bytes written.
    pub async fn download(&self, url: &str, target: &Path) -> RetryOutcome<u64, FetchError> {
        let mut attempts = self.retry.attempts();
        let mut last = None;
        while let Some(n) = attempts.next().await {
            match self.attempt(url, target).await {
                Ok(bytes) => return RetryOutcome::Succeeded { value: bytes, attempts: n },
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        "attempt {n}/{} for {url} failed: {e}",
                        self.retry.max_attempts
                    );
                    last = Some(e);
                }
                Err(e) => return RetryOutcome::Aborted { attempts: n, error: e },
            }
        }
        RetryOutcome::exhausted(attempts.made(), last)
    }

    async fn attempt(&self, url: &str, target: &Path) -> Result<u64, FetchError> {
        let resp = self
            .http
            .send(url, &self.headers.image_headers(), self.timeout_ms)
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let ct = content_type(&resp);
        if !is_image_content_type(ct.as_deref()) {
            return Err(FetchError::NotAnImage(ct));
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = part_path(target);
        match self.stream_to(resp, &part).await {
            Ok(0) => {
                discard(&part).await;
                Err(FetchError::EmptyBody)
            }
            Ok(bytes) => {
                tokio::fs::rename(&part, target).await?;
                Ok(bytes)
            }
            Err(e) => {
                discard(&part).await;
                Err(e)
            }
        }
    }

    async fn stream_to(&self, resp: reqwest::Response, part: &Path) -> Result<u64, FetchError> {
        let file = tokio::fs::File::create(part).await?;
        let mut out = tokio::io::BufWriter::with_capacity(self.chunk_size, file);
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        Ok(written)
    }
}

/// Remove a leftover temporary file.
pub async fn discard(part: &Path) {
    if let Err(e) = tokio::fs::remove_file(part).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!("could not remove {}: {e}", part.display());
        }
    }
}
