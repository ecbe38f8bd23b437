//! `pixmirror discover` runs Phase 1 and finds every image on the configured pages.

use crate::acquisition::http_client::HttpClient;
use crate::cli::output::{self, Styled};
use crate::cli::{shutdown_on_ctrl_c, DiscoverOverrides};
use crate::config::MirrorConfig;
use crate::discovery::{run_discovery, DiscoveryOutput};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::static_html::StaticRenderer;
use crate::renderer::{Renderer, RendererKind};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

/// URLs shown after a crawl.
const SAMPLE_SIZE: usize = 5;

pub async fn run(config_path: Option<&Path>, overrides: &DiscoverOverrides) -> Result<()> {
    let mut config = MirrorConfig::load(config_path)?;
    overrides.apply(&mut config);

    let shutdown = shutdown_on_ctrl_c();
    let output = discover(&config, shutdown).await?;
    print_summary(&config, &output);
    Ok(())
}

/// Pick a renderer, crawl, and release the renderer.
pub(crate) async fn discover(
    config: &MirrorConfig,
    shutdown: Arc<Notify>,
) -> Result<DiscoveryOutput> {
    config.validate_discovery()?;
    let renderer = build_renderer(config).await;
    let result = run_discovery(config, Arc::clone(&renderer), Some(shutdown)).await;
    if let Err(e) = renderer.shutdown().await {
        warn!("renderer shutdown failed: {e:#}");
    }
    result
}

/// Chromium when requested and available, the static renderer otherwise.
pub(crate) async fn build_renderer(config: &MirrorConfig) -> Arc<dyn Renderer> {
    if config.browser.renderer == RendererKind::Chromium {
        let launched = ChromiumRenderer::launch(
            &config.browser,
            config.headers.primary_user_agent(),
            config.headers.document_headers(),
        )
        .await;
        match launched {
            Ok(renderer) => {
                info!("Chromium renderer initialized");
                return Arc::new(renderer);
            }
            Err(e) => {
                warn!("Failed to initialize Chromium: {e:#}");
                warn!("Falling back to the static renderer (no scripts, no computed styles)");
            }
        }
    }
    Arc::new(StaticRenderer::new(
        HttpClient::new(config.discovery.page_timeout_ms),
        config.headers.document_headers(),
    ))
}

pub(crate) fn print_summary(config: &MirrorConfig, output: &DiscoveryOutput) {
    let report = &output.report;
    let sample: Vec<&String> = output.images.iter().take(SAMPLE_SIZE).collect();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "output_file": config.discovery.output_file,
            "report": report,
            "sample": sample,
        }));
        return;
    }
    if output::is_quiet() {
        return;
    }

    let s = Styled::new();
    let total_pages = report.pages.len();
    println!();
    println!("  {}", s.bold("Discovery summary"));
    println!(
        "  {} {}/{total_pages} pages succeeded ({} on the deferred pass)",
        s.ok_sym(),
        report.succeeded,
        report.recovered
    );
    if report.failed > 0 {
        println!("  {} {} pages failed", s.fail_sym(), report.failed);
        for page in report.failed_pages() {
            let reason = page.last_error.as_deref().unwrap_or("unknown error");
            println!("      {} {}", page.path, s.dim(reason));
        }
    }
    println!(
        "  {} {} unique images, {} stylesheets analysed ({} fetches)",
        s.ok_sym(),
        report.total_images,
        report.stylesheets_cached,
        report.stylesheet_fetches
    );
    if report.interrupted {
        println!("  {} interrupted, partial results kept", s.warn_sym());
    }
    println!("  Saved to {}", config.discovery.output_file.display());

    if !sample.is_empty() {
        println!();
        println!("  Sample:");
        for url in &sample {
            println!("    {url}");
        }
        if output.images.len() > sample.len() {
            println!(
                "    {}",
                s.dim(&format!("... and {} more", output.images.len() - sample.len()))
            );
        }
    }

    if output::is_verbose() {
        println!();
        for page in &report.pages {
            println!(
                "  [{}] {} {:?} after {} attempt(s)",
                page.index, page.path, page.outcome, page.attempts
            );
        }
    }
}
