//! CSS resource cache.
//!
//! Each stylesheet URL is fetched over plain HTTP at most once per session.
//! A failed fetch, a non-2xx status or a sheet without image references is
//! cached as a negative entry and never retried.

use super::css_urls::{css_url_references, resolve_reference};
use crate::acquisition::headers::HeaderConfig;
use crate::acquisition::http_client::HttpClient;
use crate::classify::ImageClassifier;
use crate::config::ExtractionConfig;
use crate::pacing::DelayRange;
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use url::Url;

/// What a stylesheet yielded the one time it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StylesheetEntry {
    /// Absolute image URLs, resolved against the stylesheet's own URL.
    Images(Vec<String>),
    /// Fetched, and the fetch failed or found nothing.
    Negative,
}

impl StylesheetEntry {
    pub fn images(&self) -> &[String] {
        match self {
            Self::Images(urls) => urls,
            Self::Negative => &[],
        }
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub struct CssLookup {
    pub images: Vec<String>,
    /// True when no request was made.
    pub from_cache: bool,
}

pub struct CssCache {
    http: HttpClient,
    headers: HeaderConfig,
    classifier: ImageClassifier,
    timeout_ms: u64,
    delay: DelayRange,
    entries: HashMap<String, StylesheetEntry>,
    fetches: usize,
}

impl CssCache {
    pub fn new(
        http: HttpClient,
        headers: HeaderConfig,
        classifier: ImageClassifier,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            http,
            headers,
            classifier,
            timeout_ms: config.stylesheet_timeout_ms,
            delay: config.stylesheet_delay,
            entries: HashMap::new(),
            fetches: 0,
        }
    }

    /// Image URLs referenced by `stylesheet_url`, fetching it on first use.
    /// `referer` is the page that links the sheet.
    pub async fn get_or_fetch(&mut self, stylesheet_url: &str, referer: &str) -> CssLookup {
        if let Some(entry) = self.entries.get(stylesheet_url) {
            tracing::debug!("stylesheet cache hit: {stylesheet_url}");
            return CssLookup {
                images: entry.images().to_vec(),
                from_cache: true,
            };
        }

        self.delay.pause().await;
        self.fetches += 1;
        let entry = match self.fetch(stylesheet_url, referer).await {
            Ok(images) if images.is_empty() => StylesheetEntry::Negative,
            Ok(images) => {
                tracing::debug!("{} images in stylesheet {stylesheet_url}", images.len());
                StylesheetEntry::Images(images)
            }
            Err(e) => {
                tracing::warn!("stylesheet {stylesheet_url} unavailable: {e:#}");
                StylesheetEntry::Negative
            }
        };

        let images = entry.images().to_vec();
        self.entries.insert(stylesheet_url.to_string(), entry);
        CssLookup {
            images,
            from_cache: false,
        }
    }

    async fn fetch(&self, stylesheet_url: &str, referer: &str) -> Result<Vec<String>> {
        let base = Url::parse(stylesheet_url).context("invalid stylesheet URL")?;
        let resp = self
            .http
            .get_text(
                stylesheet_url,
                &self.headers.stylesheet_headers(referer),
                self.timeout_ms,
            )
            .await?;
        if !resp.is_success() {
            bail!("HTTP {}", resp.status);
        }

        let mut images = Vec::new();
        for reference in css_url_references(&resp.body) {
            if let Some(url) = resolve_reference(&base, &reference) {
                if self.classifier.is_image_url(&url) && !images.contains(&url) {
                    images.push(url);
                }
            }
        }
        Ok(images)
    }

    pub fn entry(&self, stylesheet_url: &str) -> Option<&StylesheetEntry> {
        self.entries.get(stylesheet_url)
    }

    /// Stylesheets known to the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Network fetches performed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    pub fn negative_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, StylesheetEntry::Negative))
            .count()
    }
}
