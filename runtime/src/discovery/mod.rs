//! Phase 1: visit every configured page and write the URL list.

pub mod crawler;
pub mod session;
pub mod url_list;

use crate::acquisition::http_client::HttpClient;
use crate::config::MirrorConfig;
use crate::extraction::{CssCache, ImageExtractor};
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Notify;

pub use crawler::{CrawlReport, DiscoveryEngine, PageOutcome, PageVisit, VisitError};
pub use session::DiscoverySession;

/// Everything a finished (or interrupted) crawl produced.
#[derive(Debug)]
pub struct DiscoveryOutput {
    pub report: CrawlReport,
    pub images: BTreeSet<String>,
}

/// Crawl the configured site with `renderer` and write the URL list to
/// `config.discovery.output_file`. The file is written even when the crawl
/// is interrupted.
pub async fn run_discovery(
    config: &MirrorConfig,
    renderer: Arc<dyn Renderer>,
    shutdown: Option<Arc<Notify>>,
) -> Result<DiscoveryOutput> {
    config.validate_discovery()?;
    let pages = config.page_urls()?;
    let classifier = config.classifier();

    let css = CssCache::new(
        HttpClient::new(config.extraction.stylesheet_timeout_ms),
        config.headers.clone(),
        classifier.clone(),
        &config.extraction,
    );
    let mut session = DiscoverySession::new(css);

    let extractor = ImageExtractor::new(config.extraction.clone(), classifier);
    let mut engine = DiscoveryEngine::new(renderer, extractor, config.discovery.clone());
    if let Some(shutdown) = shutdown {
        engine = engine.with_shutdown(shutdown);
    }

    tracing::info!(
        "discovering images on {} page(s) of {}",
        pages.len(),
        config.site.base_url
    );
    let report = engine.crawl(&pages, &mut session).await?;

    let output = &config.discovery.output_file;
    url_list::write_url_list(output, &config.site.base_url, session.images())
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!("wrote {} URLs to {}", session.len(), output.display());

    Ok(DiscoveryOutput {
        report,
        images: session.into_images(),
    })
}
