//! HTTP-only renderer.
//!
//! Fetches the page document with `HttpClient` and answers DOM queries by
//! parsing it with `scraper`. Scripts never run, so computed styles are
//! unavailable and mouse/scroll input does nothing. Used when Chromium is
//! missing or `--renderer static` is requested.

use super::{NavigationResult, PageElement, RenderContext, Renderer, WaitUntil};
use crate::acquisition::headers::HeaderSet;
use crate::acquisition::http_client::HttpClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Renderer that serves documents fetched over plain HTTP.
pub struct StaticRenderer {
    http: HttpClient,
    document_headers: HeaderSet,
    active_count: Arc<AtomicUsize>,
}

impl StaticRenderer {
    pub fn new(http: HttpClient, document_headers: HeaderSet) -> Self {
        Self {
            http,
            document_headers,
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(StaticContext {
            http: self.http.clone(),
            document_headers: self.document_headers.clone(),
            document: None,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

struct LoadedDocument {
    url: String,
    html: String,
}

/// One "tab" of the static renderer: the last document navigated to.
pub struct StaticContext {
    http: HttpClient,
    document_headers: HeaderSet,
    document: Option<LoadedDocument>,
    active_count: Arc<AtomicUsize>,
}

impl StaticContext {
    fn document(&self) -> Result<&LoadedDocument> {
        self.document
            .as_ref()
            .ok_or_else(|| anyhow!("no document loaded"))
    }
}

#[async_trait]
impl RenderContext for StaticContext {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitUntil,
        timeout_ms: u64,
    ) -> Result<NavigationResult> {
        let start = Instant::now();
        self.document = None;

        let resp = self
            .http
            .get_text(url, &self.document_headers, timeout_ms)
            .await
            .map_err(|e| anyhow!("navigation failed: {e:#}"))?;

        let result = NavigationResult {
            final_url: resp.final_url.clone(),
            status: resp.status,
            load_time_ms: start.elapsed().as_millis() as u64,
        };
        self.document = Some(LoadedDocument {
            url: resp.final_url,
            html: resp.body,
        });
        Ok(result)
    }

    async fn wait_for_network_idle(&self, _timeout_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn query_elements(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        let doc = self.document()?;
        let elements = select_attributes(&doc.html, selector)?;
        Ok(elements
            .into_iter()
            .map(|attributes| Box::new(StaticElement { attributes }) as Box<dyn PageElement>)
            .collect())
    }

    async fn stylesheet_urls(&self) -> Result<Vec<String>> {
        let doc = self.document()?;
        linked_stylesheets(&doc.html, &doc.url)
    }

    async fn move_mouse(&self, _x: f64, _y: f64) -> Result<()> {
        Ok(())
    }

    async fn scroll_to(&self, _y: u32) -> Result<()> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Attribute snapshot of one parsed element.
struct StaticElement {
    attributes: Vec<(String, String)>,
}

#[async_trait]
impl PageElement for StaticElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone()))
    }

    async fn computed_style(&self, _property: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {selector:?}: {e:?}"))
}

/// Attributes of every element matching `selector`, in document order.
fn select_attributes(html: &str, selector: &str) -> Result<Vec<Vec<(String, String)>>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(|el| {
            el.value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .collect())
}

/// Absolute hrefs of `<link rel="stylesheet">` elements that name a `.css` file.
fn linked_stylesheets(html: &str, page_url: &str) -> Result<Vec<String>> {
    let base = Url::parse(page_url)?;
    let selector = parse_selector("link[href]")?;
    let document = Html::parse_document(html);

    let mut urls = Vec::new();
    for el in document.select(&selector) {
        let is_stylesheet = el
            .value()
            .attr("rel")
            .map(|rel| {
                rel.split_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("stylesheet"))
            })
            .unwrap_or(false);
        if !is_stylesheet {
            continue;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        match base.join(href.trim()) {
            Ok(u) if u.as_str().contains(".css") => urls.push(u.to_string()),
            Ok(_) => {}
            Err(e) => tracing::debug!("skipping stylesheet href {href:?}: {e}"),
        }
    }
    Ok(urls)
}
