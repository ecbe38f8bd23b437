//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, PageElement, RenderContext, Renderer, WaitUntil};
use crate::config::BrowserSettings;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::element::Element;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Polling cadence while waiting for network idle.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Consecutive unchanged polls that count as idle (500ms of quiet).
const IDLE_QUIET_POLLS: u32 = 2;

const STYLESHEETS_JS: &str = r#"
    Array.from(document.styleSheets)
        .map(sheet => { try { return sheet.href; } catch (e) { return null; } })
        .filter(href => href && href.includes('.css'))
"#;

const RESOURCE_COUNT_JS: &str = r#"
    (document.readyState === 'complete' ? 0 : 1000000) +
        performance.getEntriesByType('resource').length
"#;

const DOCUMENT_STATUS_JS: &str = r#"
    (() => {
        const nav = performance.getEntriesByType('navigation')[0];
        return nav && nav.responseStatus ? nav.responseStatus : 0;
    })()
"#;

/// Find the Chromium binary path.
///
/// Lookup order: `PIXMIRROR_CHROMIUM_PATH`, then `browser.chromium_path`,
/// then a Chrome for Testing build unpacked by hand under
/// `~/.pixmirror/chromium/`, then `google-chrome`, `chromium` or
/// `chromium-browser` on `PATH`, and on macOS the standard Chrome app bundle.
/// Nothing is downloaded automatically.
pub fn find_chromium(configured: Option<&str>) -> Option<PathBuf> {
    if let Ok(p) = std::env::var("PIXMIRROR_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(p) = configured {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        if let Some(found) = user_install_candidates(&home).into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Where a hand-unpacked Chrome for Testing archive is looked for. The
/// archive's top directory (`chrome-linux64`, `chrome-mac-arm64`, ...) or a
/// bare `chrome` binary may sit directly under `~/.pixmirror/chromium/`.
fn user_install_candidates(home: &Path) -> Vec<PathBuf> {
    let root = home.join(".pixmirror").join("chromium");
    let mut candidates = if cfg!(target_os = "macos") {
        ["chrome-mac-arm64", "chrome-mac-x64"]
            .iter()
            .map(|dir| {
                root.join(dir)
                    .join("Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing")
            })
            .collect::<Vec<_>>()
    } else {
        vec![root.join("chrome-linux64").join("chrome")]
    };
    candidates.push(root.join("chrome"));
    candidates
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
    document_headers: Vec<(String, String)>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance presenting `user_agent` and sending
    /// `document_headers` with every page request.
    pub async fn launch(
        settings: &BrowserSettings,
        user_agent: &str,
        document_headers: Vec<(String, String)>,
    ) -> Result<Self> {
        let chrome_path = find_chromium(settings.chromium_path.as_deref())
            .context("Chromium not found. Set PIXMIRROR_CHROMIUM_PATH or browser.chromium_path.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(settings.window_width, settings.window_height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={user_agent}"));
        builder = if settings.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        for arg in &settings.extra_args {
            builder = builder.arg(arg.clone());
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
            document_headers: document_headers
                .into_iter()
                .filter(|(k, _)| !k.eq_ignore_ascii_case("user-agent"))
                .collect(),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        if !self.document_headers.is_empty() {
            let headers: serde_json::Map<String, serde_json::Value> = self
                .document_headers
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            let params =
                SetExtraHttpHeadersParams::new(Headers::new(serde_json::Value::Object(headers)));
            if let Err(e) = page.execute(params).await {
                tracing::warn!("could not set extra page headers: {e}");
            }
        }

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped when ChromiumRenderer is dropped
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn evaluate<T: serde::de::DeserializeOwned + Send>(&self, script: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitUntil,
        timeout_ms: u64,
    ) -> Result<NavigationResult> {
        let start = Instant::now();

        // `goto` resolves once the load event fired, which covers both
        // `DomContentLoaded` and `Load`.
        let result = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }

        if wait == WaitUntil::NetworkIdle {
            let spent = start.elapsed().as_millis() as u64;
            self.wait_for_network_idle(timeout_ms.saturating_sub(spent))
                .await?;
        }

        let load_time_ms = start.elapsed().as_millis() as u64;

        // Chrome reports 0 when the status is unknown (cached or opaque
        // documents); treat that as success.
        let status = match self.evaluate::<u16>(DOCUMENT_STATUS_JS).await {
            Ok(0) | Err(_) => 200,
            Ok(s) => s,
        };

        let final_url = self
            .page
            .url()
            .await
            .unwrap_or_default()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            status,
            load_time_ms,
        })
    }

    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut last: Option<u64> = None;
        let mut quiet = 0u32;

        loop {
            let count: u64 = self.evaluate(RESOURCE_COUNT_JS).await?;
            if last == Some(count) {
                quiet += 1;
            } else {
                quiet = 0;
                last = Some(count);
            }
            if quiet >= IDLE_QUIET_POLLS {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("network still busy after {timeout_ms}ms");
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    async fn query_elements(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .with_context(|| format!("query failed for selector {selector:?}"))?;

        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromiumElement { element }) as Box<dyn PageElement>)
            .collect())
    }

    async fn stylesheet_urls(&self) -> Result<Vec<String>> {
        self.evaluate(STYLESHEETS_JS).await
    }

    async fn move_mouse(&self, x: f64, y: f64) -> Result<()> {
        self.page
            .move_mouse(Point::new(x, y))
            .await
            .context("mouse move failed")?;
        Ok(())
    }

    async fn scroll_to(&self, y: u32) -> Result<()> {
        self.page
            .evaluate(format!("window.scrollTo(0, {y})").as_str())
            .await
            .context("scroll failed")?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

/// A DOM element inside a Chromium page.
struct ChromiumElement {
    element: Element,
}

#[async_trait]
impl PageElement for ChromiumElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.element
            .attribute(name)
            .await
            .with_context(|| format!("failed to read attribute {name}"))
    }

    async fn computed_style(&self, property: &str) -> Result<Option<String>> {
        let property = serde_json::to_string(property)?;
        let returns = self
            .element
            .call_js_fn(
                format!(
                    "function() {{ return window.getComputedStyle(this).getPropertyValue({property}); }}"
                ),
                false,
            )
            .await
            .context("computed style read failed")?;

        Ok(returns
            .result
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty()))
    }
}
