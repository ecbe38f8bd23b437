//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer`, `RenderContext` and `PageElement` traits that
//! abstract over the browser engine (Chromium via chromiumoxide, or the
//! HTTP-only `StaticRenderer` when no browser is available).

pub mod chromium;
pub mod static_html;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// HTTP status code of the document response.
    pub status: u16,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// The lifecycle point `navigate` waits for before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

/// Which renderer to drive discovery with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    Chromium,
    Static,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL, waiting for `wait` but no longer than `timeout_ms`.
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitUntil,
        timeout_ms: u64,
    ) -> Result<NavigationResult>;
    /// Wait until the page stops issuing network requests.
    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<()>;
    /// All elements matching a CSS selector, in document order.
    async fn query_elements(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>>;
    /// Absolute URLs of the stylesheets attached to the document.
    async fn stylesheet_urls(&self) -> Result<Vec<String>>;
    /// Move the mouse pointer to viewport coordinates.
    async fn move_mouse(&self, x: f64, y: f64) -> Result<()>;
    /// Scroll the viewport to a vertical offset.
    async fn scroll_to(&self, y: u32) -> Result<()>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// One element of a rendered document.
#[async_trait]
pub trait PageElement: Send + Sync {
    /// Raw attribute value, `None` when absent.
    async fn attribute(&self, name: &str) -> Result<Option<String>>;
    /// Computed value of a CSS property (e.g. `background-image`).
    async fn computed_style(&self, property: &str) -> Result<Option<String>>;
}
