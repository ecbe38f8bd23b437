//! Phase 2: mirror every URL in the list under the download root.

pub mod engine;
pub mod fetch;
pub mod path_mapper;

use crate::acquisition::http_client::HttpClient;
use crate::config::MirrorConfig;
use crate::discovery::url_list::read_url_list;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Notify;

pub use engine::{DownloadEngine, DownloadJob, DownloadReport, JobStatus, TreeSummary};
pub use fetch::{Downloader, FetchError};
pub use path_mapper::{MirroredPath, PathMapper};

/// Read `config.download.input_file` and download everything it lists.
/// A missing input file or an unusable output directory is fatal; failures
/// of individual jobs are not.
pub async fn run_download(
    config: &MirrorConfig,
    shutdown: Option<Arc<Notify>>,
) -> Result<DownloadReport> {
    config.validate_download()?;
    let list = read_url_list(&config.download.input_file)?;

    let output_dir = &config.download.output_dir;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create output directory {}", output_dir.display()))?;

    tracing::info!(
        "{} URLs to mirror into {} ({} rejected lines)",
        list.urls.len(),
        output_dir.display(),
        list.rejected.len()
    );

    let downloader = Downloader::new(
        HttpClient::new(config.download.timeout_ms),
        config.headers.clone(),
        &config.download,
    );
    let mut engine = DownloadEngine::new(
        downloader,
        PathMapper::new(config.download.max_filename_len)
            .with_extensions(config.classifier().extensions()),
        output_dir.clone(),
        config.download.job_delay,
    );
    if let Some(shutdown) = shutdown {
        engine = engine.with_shutdown(shutdown);
    }

    let mut report = engine.run(&list.urls).await;
    report.rejected_lines = list.rejected;
    Ok(report)
}
