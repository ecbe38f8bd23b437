//! Scripted renderer and fast configurations shared by the integration tests.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use pixmirror::acquisition::headers::HeaderConfig;
use pixmirror::acquisition::http_client::HttpClient;
use pixmirror::classify::ImageClassifier;
use pixmirror::config::{
    DiscoveryConfig, DownloadConfig, ExtractionConfig, MirrorConfig, StabilizeConfig,
};
use pixmirror::discovery::DiscoverySession;
use pixmirror::extraction::CssCache;
use pixmirror::pacing::DelayRange;
use pixmirror::renderer::{NavigationResult, PageElement, RenderContext, Renderer, WaitUntil};
use pixmirror::retry::RetryPolicy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fake DOM ──

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub attributes: Vec<(String, String)>,
    /// Matched by slider/carousel selectors.
    pub slider: bool,
    pub computed_background: Option<String>,
    /// Every read on this element fails.
    pub broken: bool,
}

impl FakeElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn slider(mut self) -> Self {
        self.slider = true;
        self
    }

    pub fn computed(mut self, background_image: &str) -> Self {
        self.computed_background = Some(background_image.to_string());
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

#[async_trait]
impl PageElement for FakeElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        if self.broken {
            return Err(anyhow!("element detached"));
        }
        Ok(self
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone()))
    }

    async fn computed_style(&self, property: &str) -> Result<Option<String>> {
        if self.broken {
            return Err(anyhow!("element detached"));
        }
        Ok(match property {
            "background-image" => self.computed_background.clone(),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub status: u16,
    pub elements: Vec<FakeElement>,
    pub stylesheets: Vec<String>,
    pub failing_selectors: Vec<String>,
    pub stylesheets_fail: bool,
    /// Error returned by mouse moves or scrolls on this page.
    pub mouse_error: Option<String>,
    pub scroll_error: Option<String>,
}

impl FakePage {
    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            elements: Vec::new(),
            stylesheets: Vec::new(),
            failing_selectors: Vec::new(),
            stylesheets_fail: false,
            mouse_error: None,
            scroll_error: None,
        }
    }

    pub fn with(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn stylesheet(mut self, url: &str) -> Self {
        self.stylesheets.push(url.to_string());
        self
    }

    pub fn fail_query(mut self, selector: &str) -> Self {
        self.failing_selectors.push(selector.to_string());
        self
    }

    pub fn fail_stylesheets(mut self) -> Self {
        self.stylesheets_fail = true;
        self
    }

    pub fn fail_mouse(mut self, message: &str) -> Self {
        self.mouse_error = Some(message.to_string());
        self
    }

    pub fn fail_scroll(mut self, message: &str) -> Self {
        self.scroll_error = Some(message.to_string());
        self
    }

    /// `[attr]` selectors match by attribute; anything else is treated as
    /// the slider/carousel selector.
    fn select(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        if self.failing_selectors.iter().any(|s| s == selector) {
            return Err(anyhow!("evaluation failed for {selector}"));
        }
        let matches = |el: &FakeElement| match selector
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
        {
            Some(attr) if !selector.contains(',') => el.has_attribute(attr),
            _ => el.slider,
        };
        Ok(self
            .elements
            .iter()
            .filter(|el| matches(*el))
            .map(|el| Box::new(el.clone()) as Box<dyn PageElement>)
            .collect())
    }
}

// ── Fake renderer ──

/// What one navigation to a URL does.
#[derive(Debug, Clone)]
pub enum Visit {
    Page(FakePage),
    Error(String),
}

#[derive(Default)]
struct Script {
    visits: HashMap<String, Vec<Visit>>,
    navigations: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeRenderer {
    script: Arc<Mutex<Script>>,
    active: Arc<AtomicUsize>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue what navigating to `url` does, in order. The last entry repeats.
    pub fn script(&self, url: &str, visits: Vec<Visit>) {
        self.script
            .lock()
            .unwrap()
            .visits
            .insert(url.to_string(), visits);
    }

    pub fn navigations_to(&self, url: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .navigations
            .iter()
            .filter(|u| *u == url)
            .count()
    }

    pub fn total_navigations(&self) -> usize {
        self.script.lock().unwrap().navigations.len()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            script: Arc::clone(&self.script),
            active: Arc::clone(&self.active),
            current: None,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

pub struct FakeContext {
    script: Arc<Mutex<Script>>,
    active: Arc<AtomicUsize>,
    current: Option<FakePage>,
}

impl FakeContext {
    /// A context that already shows `page`.
    pub fn showing(page: FakePage) -> Self {
        Self {
            script: Arc::default(),
            active: Arc::default(),
            current: Some(page),
        }
    }

    fn page(&self) -> Result<&FakePage> {
        self.current.as_ref().ok_or_else(|| anyhow!("no page loaded"))
    }
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitUntil,
        _timeout_ms: u64,
    ) -> Result<NavigationResult> {
        self.current = None;
        let visit = {
            let mut script = self.script.lock().unwrap();
            script.navigations.push(url.to_string());
            match script.visits.get_mut(url) {
                Some(queue) if queue.len() > 1 => Some(queue.remove(0)),
                Some(queue) => queue.first().cloned(),
                None => None,
            }
        };

        match visit {
            Some(Visit::Page(page)) => {
                let status = page.status;
                self.current = Some(page);
                Ok(NavigationResult {
                    final_url: url.to_string(),
                    status,
                    load_time_ms: 1,
                })
            }
            Some(Visit::Error(msg)) => Err(anyhow!(msg)),
            None => Err(anyhow!("net::ERR_NAME_NOT_RESOLVED at {url}")),
        }
    }

    async fn wait_for_network_idle(&self, _timeout_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn query_elements(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        self.page()?.select(selector)
    }

    async fn stylesheet_urls(&self) -> Result<Vec<String>> {
        let page = self.page()?;
        if page.stylesheets_fail {
            return Err(anyhow!("document.styleSheets unavailable"));
        }
        Ok(page.stylesheets.clone())
    }

    async fn move_mouse(&self, _x: f64, _y: f64) -> Result<()> {
        match &self.page()?.mouse_error {
            Some(msg) => Err(anyhow!(msg.clone())),
            None => Ok(()),
        }
    }

    async fn scroll_to(&self, _y: u32) -> Result<()> {
        match &self.page()?.scroll_error {
            Some(msg) => Err(anyhow!(msg.clone())),
            None => Ok(()),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Configurations without pacing delays ──

pub fn fast_discovery() -> DiscoveryConfig {
    DiscoveryConfig {
        retry: RetryPolicy::new(3, DelayRange::ZERO),
        deferred: RetryPolicy::once(),
        page_delay: DelayRange::ZERO,
        stabilize: StabilizeConfig {
            scroll_pause: DelayRange::ZERO,
            settle_ms: 0,
            ..StabilizeConfig::default()
        },
        ..DiscoveryConfig::default()
    }
}

pub fn fast_extraction() -> ExtractionConfig {
    ExtractionConfig {
        stylesheet_delay: DelayRange::ZERO,
        ..ExtractionConfig::default()
    }
}

pub fn fast_download() -> DownloadConfig {
    DownloadConfig {
        retry: RetryPolicy::new(3, DelayRange::ZERO),
        job_delay: DelayRange::ZERO,
        timeout_ms: 5_000,
        ..DownloadConfig::default()
    }
}

/// A whole configuration with every delay removed, writing under `dir`.
pub fn fast_config(base_url: &str, pages: &[&str], dir: &Path) -> MirrorConfig {
    let mut config = MirrorConfig::default();
    config.site.base_url = base_url.to_string();
    config.site.pages = pages.iter().map(|p| p.to_string()).collect();
    config.discovery = fast_discovery();
    config.discovery.output_file = dir.join("image_files_url.txt");
    config.extraction = fast_extraction();
    config.download = fast_download();
    config.download.input_file = dir.join("image_files_url.txt");
    config.download.output_dir = dir.join("downloaded_images");
    config
}

pub fn css_cache() -> CssCache {
    CssCache::new(
        HttpClient::new(5_000),
        HeaderConfig::default(),
        ImageClassifier::default(),
        &fast_extraction(),
    )
}

pub fn session() -> DiscoverySession {
    DiscoverySession::new(css_cache())
}
