//! Image extraction engine.
//!
//! Four independent strategies run against one rendered page:
//!
//! 1. **Attributes**: source and lazy-source attributes, plus `srcset` lists.
//! 2. **Inline styles**: `url(...)` in every `style` attribute, with a second
//!    pass over slider/carousel elements.
//! 3. **Stylesheets**: linked sheets fetched through [`CssCache`] and resolved
//!    against the sheet's own URL.
//! 4. **Dynamic styles**: computed `background-image` and the lazy background
//!    attribute of a bounded sample of slider-like elements.
//!
//! A failing strategy is logged and skipped. Within a strategy a failing
//! selector query skips only that selector, and a failing element only that
//! element. Extraction never fails a page.

pub mod css_urls;
pub mod stylesheets;

use crate::classify::ImageClassifier;
use crate::config::ExtractionConfig;
use crate::renderer::{PageElement, RenderContext};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use url::Url;

use css_urls::{css_url_references, resolve_reference, srcset_candidates};
pub use stylesheets::{CssCache, CssLookup, StylesheetEntry};

/// Per-page extraction counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Image references accepted by each strategy (before deduplication).
    pub attribute_refs: usize,
    pub inline_style_refs: usize,
    pub stylesheet_refs: usize,
    pub dynamic_refs: usize,
    pub stylesheets_fetched: usize,
    pub stylesheets_cached: usize,
    /// Strategies that failed outright.
    pub failed_strategies: usize,
    /// Selector queries that failed and were skipped.
    pub failed_queries: usize,
    /// URLs not seen on any earlier page. Filled in by the session.
    pub new_urls: usize,
}

/// Images found on one page.
#[derive(Debug, Clone, Default)]
pub struct PageImages {
    pub urls: BTreeSet<String>,
    pub stats: ExtractionStats,
}

pub struct ImageExtractor {
    config: ExtractionConfig,
    classifier: ImageClassifier,
}

impl ImageExtractor {
    pub fn new(config: ExtractionConfig, classifier: ImageClassifier) -> Self {
        Self { config, classifier }
    }

    /// Run every strategy against the document loaded in `ctx`.
    pub async fn extract(
        &self,
        ctx: &dyn RenderContext,
        page_url: &str,
        css: &mut CssCache,
    ) -> PageImages {
        let mut found = PageImages::default();
        let base = match Url::parse(page_url) {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!("cannot resolve references against {page_url}: {e}");
                return found;
            }
        };

        found.stats.attribute_refs = self.scan_attributes(ctx, &base, &mut found).await;
        found.stats.inline_style_refs = self.scan_inline_styles(ctx, &base, &mut found).await;

        if let Err(e) = self.scan_stylesheets(ctx, page_url, css, &mut found).await {
            self.strategy_failed("stylesheet", page_url, e, &mut found.stats);
        }

        match self.scan_dynamic_styles(ctx, &base, &mut found.urls).await {
            Ok(n) => found.stats.dynamic_refs = n,
            Err(e) => self.strategy_failed("dynamic style", page_url, e, &mut found.stats),
        }

        found
    }

    fn strategy_failed(
        &self,
        strategy: &str,
        page_url: &str,
        error: anyhow::Error,
        stats: &mut ExtractionStats,
    ) {
        tracing::warn!("{strategy} scan failed on {page_url}: {error:#}");
        stats.failed_strategies += 1;
    }

    /// Resolve and classify one reference; true when it was kept.
    fn accept(&self, base: &Url, reference: &str, out: &mut BTreeSet<String>) -> bool {
        match resolve_reference(base, reference) {
            Some(url) if self.classifier.is_image_url(&url) => {
                out.insert(url);
                true
            }
            _ => false,
        }
    }

    fn accept_css(&self, base: &Url, css: &str, out: &mut BTreeSet<String>) -> usize {
        css_url_references(css)
            .iter()
            .filter(|r| self.accept(base, r, out))
            .count()
    }

    async fn scan_attributes(
        &self,
        ctx: &dyn RenderContext,
        base: &Url,
        found: &mut PageImages,
    ) -> usize {
        let mut accepted = 0;

        for attr in &self.config.source_attributes {
            for el in query_or_skip(ctx, &format!("[{attr}]"), &mut found.stats).await {
                if let Some(value) = read_attribute(el.as_ref(), attr).await {
                    accepted += usize::from(self.accept(base, &value, &mut found.urls));
                }
            }
        }

        for attr in &self.config.srcset_attributes {
            for el in query_or_skip(ctx, &format!("[{attr}]"), &mut found.stats).await {
                if let Some(value) = read_attribute(el.as_ref(), attr).await {
                    accepted += srcset_candidates(&value)
                        .iter()
                        .filter(|c| self.accept(base, c, &mut found.urls))
                        .count();
                }
            }
        }

        accepted
    }

    async fn scan_inline_styles(
        &self,
        ctx: &dyn RenderContext,
        base: &Url,
        found: &mut PageImages,
    ) -> usize {
        let mut accepted = 0;
        for selector in ["[style]", self.config.slider_selector.as_str()] {
            for el in query_or_skip(ctx, selector, &mut found.stats).await {
                if let Some(style) = read_attribute(el.as_ref(), "style").await {
                    accepted += self.accept_css(base, &style, &mut found.urls);
                }
            }
        }
        accepted
    }

    async fn scan_stylesheets(
        &self,
        ctx: &dyn RenderContext,
        page_url: &str,
        css: &mut CssCache,
        found: &mut PageImages,
    ) -> Result<()> {
        let sheets = ctx
            .stylesheet_urls()
            .await
            .context("listing stylesheets")?;

        for sheet in sheets {
            let CssLookup { images, from_cache } = css.get_or_fetch(&sheet, page_url).await;
            if from_cache {
                found.stats.stylesheets_cached += 1;
            } else {
                found.stats.stylesheets_fetched += 1;
            }
            found.stats.stylesheet_refs += images.len();
            found.urls.extend(images);
        }
        Ok(())
    }

    async fn scan_dynamic_styles(
        &self,
        ctx: &dyn RenderContext,
        base: &Url,
        out: &mut BTreeSet<String>,
    ) -> Result<usize> {
        let elements = query(ctx, &self.config.dynamic_selector).await?;
        let mut accepted = 0;

        for el in elements.iter().take(self.config.dynamic_sample) {
            match el.computed_style("background-image").await {
                Ok(Some(value)) if value != "none" => {
                    accepted += self.accept_css(base, &value, out);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("computed style unavailable: {e:#}"),
            }

            let lazy = &self.config.lazy_background_attribute;
            if let Some(value) = read_attribute(el.as_ref(), lazy).await {
                accepted += if value.to_ascii_lowercase().contains("url(") {
                    self.accept_css(base, &value, out)
                } else {
                    usize::from(self.accept(base, &value, out))
                };
            }
        }
        Ok(accepted)
    }
}

async fn query(ctx: &dyn RenderContext, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
    ctx.query_elements(selector)
        .await
        .with_context(|| format!("querying {selector:?}"))
}

/// Matches for `selector`; a failing query is logged and yields nothing.
async fn query_or_skip(
    ctx: &dyn RenderContext,
    selector: &str,
    stats: &mut ExtractionStats,
) -> Vec<Box<dyn PageElement>> {
    match query(ctx, selector).await {
        Ok(elements) => elements,
        Err(e) => {
            tracing::warn!("skipping selector: {e:#}");
            stats.failed_queries += 1;
            Vec::new()
        }
    }
}

/// Non-empty attribute value; a failing read skips the element.
async fn read_attribute(el: &dyn PageElement, name: &str) -> Option<String> {
    match el.attribute(name).await {
        Ok(Some(value)) if !value.trim().is_empty() => Some(value),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("skipping element, {name} unreadable: {e:#}");
            None
        }
    }
}
