//! Page visits: navigate, stabilize, extract, with bounded retries.
//!
//! Each page gets `discovery.retry` immediate attempts. Pages that exhaust
//! them are deferred and get one more pass under `discovery.deferred` after
//! the whole list has been visited. A page that fails both is recorded as
//! failed and contributes nothing; the crawl always runs to the end.

use super::session::DiscoverySession;
use crate::config::DiscoveryConfig;
use crate::extraction::{ExtractionStats, ImageExtractor, PageImages};
use crate::renderer::{RenderContext, Renderer};
use crate::retry::{RetryOutcome, RetryPolicy};
use anyhow::{Context, Result};
use rand::Rng;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Why one visit attempt failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VisitError {
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("page did not respond to input: {0}")]
    Stabilize(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOutcome {
    Pending,
    Success,
    Deferred,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageVisit {
    /// 1-based position in the page list.
    pub index: usize,
    pub path: String,
    pub url: String,
    /// Attempts across both passes.
    pub attempts: u32,
    pub outcome: PageOutcome,
    /// True when the page only succeeded on the deferred pass.
    pub recovered: bool,
    pub stats: Option<ExtractionStats>,
    pub last_error: Option<String>,
}

impl PageVisit {
    fn new(index: usize, path: &str, url: &str) -> Self {
        Self {
            index,
            path: path.to_string(),
            url: url.to_string(),
            attempts: 0,
            outcome: PageOutcome::Pending,
            recovered: false,
            stats: None,
            last_error: None,
        }
    }
}

/// Summary of one crawl.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub pages: Vec<PageVisit>,
    pub succeeded: usize,
    pub failed: usize,
    pub recovered: usize,
    pub total_images: usize,
    pub stylesheets_cached: usize,
    pub stylesheet_fetches: usize,
    pub interrupted: bool,
    pub elapsed_ms: u64,
}

impl CrawlReport {
    pub fn failed_pages(&self) -> impl Iterator<Item = &PageVisit> {
        self.pages
            .iter()
            .filter(|p| p.outcome == PageOutcome::Failed)
    }
}

pub struct DiscoveryEngine {
    renderer: Arc<dyn Renderer>,
    extractor: ImageExtractor,
    config: DiscoveryConfig,
    shutdown: Option<Arc<Notify>>,
}

impl DiscoveryEngine {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        extractor: ImageExtractor,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            renderer,
            extractor,
            config,
            shutdown: None,
        }
    }

    /// Stop between (or during) page visits once `shutdown` is notified.
    pub fn with_shutdown(mut self, shutdown: Arc<Notify>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Visit `pages` (`(path, url)` pairs) in order, merging every page's
    /// images into `session`.
    pub async fn crawl(
        &self,
        pages: &[(String, String)],
        session: &mut DiscoverySession,
    ) -> Result<CrawlReport> {
        let start = Instant::now();
        let mut ctx = self
            .renderer
            .new_context()
            .await
            .context("failed to open a browser context")?;

        let mut visits: Vec<PageVisit> = pages
            .iter()
            .enumerate()
            .map(|(i, (path, url))| PageVisit::new(i + 1, path, url))
            .collect();
        let total = visits.len();
        let mut interrupted = false;

        for i in 0..total {
            if i > 0 && self.interruptible(self.config.page_delay.pause()).await.is_none() {
                interrupted = true;
                break;
            }

            let visit = &mut visits[i];
            tracing::info!("[{}/{total}] visiting {}", visit.index, visit.url);
            let visited = self
                .interruptible(self.visit_with_retry(
                    ctx.as_mut(),
                    &self.config.retry,
                    self.config.page_timeout_ms,
                    visit,
                    session,
                ))
                .await;
            let Some(outcome) = visited else {
                interrupted = true;
                break;
            };
            self.settle_visit(visit, outcome, PageOutcome::Deferred, session);
        }

        let deferred: Vec<usize> = visits
            .iter()
            .enumerate()
            .filter(|(_, v)| v.outcome == PageOutcome::Deferred)
            .map(|(i, _)| i)
            .collect();

        if !interrupted && !deferred.is_empty() {
            tracing::info!("retrying {} deferred page(s)", deferred.len());
            for i in deferred {
                let visit = &mut visits[i];
                tracing::info!("deferred retry: {}", visit.url);
                let visited = self
                    .interruptible(self.visit_with_retry(
                        ctx.as_mut(),
                        &self.config.deferred,
                        self.config.deferred_timeout_ms,
                        visit,
                        session,
                    ))
                    .await;
                let Some(outcome) = visited else {
                    interrupted = true;
                    break;
                };
                visit.recovered = outcome.is_success();
                self.settle_visit(visit, outcome, PageOutcome::Failed, session);
            }
        }

        if let Err(e) = ctx.close().await {
            tracing::warn!("failed to close browser context: {e:#}");
        }

        if interrupted {
            tracing::warn!("crawl interrupted, keeping {} images found so far", session.len());
        }

        let count = |o: PageOutcome| visits.iter().filter(|v| v.outcome == o).count();
        Ok(CrawlReport {
            succeeded: count(PageOutcome::Success),
            failed: count(PageOutcome::Failed),
            recovered: visits.iter().filter(|v| v.recovered).count(),
            total_images: session.len(),
            stylesheets_cached: session.css().len(),
            stylesheet_fetches: session.css().fetch_count(),
            interrupted,
            elapsed_ms: start.elapsed().as_millis() as u64,
            pages: visits,
        })
    }

    /// Apply one pass's outcome; `on_exhausted` is the state a page lands
    /// in when the pass runs out of attempts.
    fn settle_visit(
        &self,
        visit: &mut PageVisit,
        outcome: RetryOutcome<PageImages, VisitError>,
        on_exhausted: PageOutcome,
        session: &mut DiscoverySession,
    ) {
        match outcome {
            RetryOutcome::Succeeded { value: mut page, .. } => {
                let found = page.urls.len();
                let new_urls = session.absorb_page(&mut page);
                tracing::info!(
                    "{}: {found} images ({new_urls} new, {} total)",
                    visit.path,
                    session.len()
                );
                visit.outcome = PageOutcome::Success;
                visit.stats = Some(page.stats);
                visit.last_error = None;
            }
            RetryOutcome::Exhausted { last_error, .. } => {
                visit.last_error = last_error.map(|e| e.to_string());
                visit.outcome = on_exhausted;
                match on_exhausted {
                    PageOutcome::Deferred => {
                        tracing::warn!("{}: attempts exhausted, deferring", visit.path)
                    }
                    _ => tracing::warn!("{}: giving up", visit.path),
                }
            }
            RetryOutcome::Aborted { error, .. } => {
                visit.last_error = Some(error.to_string());
                visit.outcome = PageOutcome::Failed;
                tracing::warn!("{}: {error}", visit.path);
            }
        }
    }

    async fn visit_with_retry(
        &self,
        ctx: &mut dyn RenderContext,
        policy: &RetryPolicy,
        timeout_ms: u64,
        visit: &mut PageVisit,
        session: &mut DiscoverySession,
    ) -> RetryOutcome<PageImages, VisitError> {
        let mut attempts = policy.attempts();
        let mut last = None;
        while let Some(n) = attempts.next().await {
            visit.attempts += 1;
            match self.visit_once(ctx, &visit.url, timeout_ms, session).await {
                Ok(page) => return RetryOutcome::Succeeded { value: page, attempts: n },
                Err(e) => {
                    tracing::warn!(
                        "attempt {n}/{} for {} failed: {e}",
                        policy.max_attempts,
                        visit.url
                    );
                    last = Some(e);
                }
            }
        }
        RetryOutcome::exhausted(attempts.made(), last)
    }

    async fn visit_once(
        &self,
        ctx: &mut dyn RenderContext,
        url: &str,
        timeout_ms: u64,
        session: &mut DiscoverySession,
    ) -> Result<PageImages, VisitError> {
        let nav = ctx
            .navigate(url, self.config.wait_until, timeout_ms)
            .await
            .map_err(|e| VisitError::Navigation(format!("{e:#}")))?;
        if nav.status >= 400 {
            return Err(VisitError::HttpStatus(nav.status));
        }
        tracing::debug!("loaded {} in {}ms", nav.final_url, nav.load_time_ms);

        self.stabilize(&*ctx).await?;

        let page_url = if nav.final_url.is_empty() {
            url
        } else {
            nav.final_url.as_str()
        };
        Ok(self.extractor.extract(&*ctx, page_url, session.css_mut()).await)
    }

    /// Let lazy content load: network idle, a mouse move, a scroll sweep,
    /// then a settle pause.
    async fn stabilize(&self, ctx: &dyn RenderContext) -> Result<(), VisitError> {
        let s = &self.config.stabilize;

        if let Err(e) = ctx.wait_for_network_idle(s.network_idle_timeout_ms).await {
            tracing::debug!("network not idle after {}ms: {e:#}", s.network_idle_timeout_ms);
        }

        let (x, y) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(s.mouse_x.0..=s.mouse_x.1),
                rng.gen_range(s.mouse_y.0..=s.mouse_y.1),
            )
        };
        ctx.move_mouse(x, y)
            .await
            .map_err(|e| VisitError::Stabilize(format!("{e:#}")))?;

        for &position in &s.scroll_positions {
            ctx.scroll_to(position)
                .await
                .map_err(|e| VisitError::Stabilize(format!("{e:#}")))?;
            s.scroll_pause.pause().await;
        }

        if s.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(s.settle_ms)).await;
        }
        Ok(())
    }

    /// Run `fut` unless shutdown is signalled first.
    async fn interruptible<F: Future>(&self, fut: F) -> Option<F::Output> {
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
