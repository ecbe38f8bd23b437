//! Configuration loading and resolution.
//!
//! Every section has defaults, so an empty file (or no file at all) is a
//! valid configuration apart from the site to crawl. The file is resolved
//! from `--config`, then `PIXMIRROR_CONFIG`, then `./pixmirror.toml`.

use crate::acquisition::headers::HeaderConfig;
use crate::classify::{ImageClassifier, DEFAULT_IMAGE_EXTENSIONS};
use crate::error::{MirrorError, MirrorResult};
use crate::pacing::DelayRange;
use crate::renderer::{RendererKind, WaitUntil};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pixmirror.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "PIXMIRROR_CONFIG";

/// Shortest filename bound that still fits a synthesized name.
const MIN_FILENAME_LEN: usize = 16;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub site: SiteConfig,
    pub browser: BrowserSettings,
    pub discovery: DiscoveryConfig,
    pub extraction: ExtractionConfig,
    pub download: DownloadConfig,
    pub headers: HeaderConfig,
    pub image_extensions: ImageExtensions,
}

/// The site and the enumerated page paths to visit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub renderer: RendererKind,
    pub headless: bool,
    pub chromium_path: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    /// Extra Chromium command-line switches.
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            renderer: RendererKind::Chromium,
            headless: true,
            chromium_path: None,
            window_width: 1920,
            window_height: 1080,
            extra_args: Vec::new(),
        }
    }
}

/// Phase 1 pacing, retry and stabilization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Where the URL list is written.
    pub output_file: PathBuf,
    pub wait_until: WaitUntil,
    pub page_timeout_ms: u64,
    /// Immediate retries for one page.
    pub retry: RetryPolicy,
    /// The final pass over deferred pages.
    pub deferred: RetryPolicy,
    pub deferred_timeout_ms: u64,
    /// Pause between consecutive pages.
    pub page_delay: DelayRange,
    pub stabilize: StabilizeConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from("image_files_url.txt"),
            wait_until: WaitUntil::DomContentLoaded,
            page_timeout_ms: 90_000,
            retry: RetryPolicy::new(3, DelayRange::new(3_000, 6_000)),
            deferred: RetryPolicy::once().with_initial_delay(DelayRange::new(3_000, 5_000)),
            deferred_timeout_ms: 60_000,
            page_delay: DelayRange::new(2_000, 4_000),
            stabilize: StabilizeConfig::default(),
        }
    }
}

/// Simulated interaction after a page loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizeConfig {
    pub network_idle_timeout_ms: u64,
    pub mouse_x: (f64, f64),
    pub mouse_y: (f64, f64),
    pub scroll_positions: Vec<u32>,
    pub scroll_pause: DelayRange,
    pub settle_ms: u64,
}

impl Default for StabilizeConfig {
    fn default() -> Self {
        Self {
            network_idle_timeout_ms: 15_000,
            mouse_x: (200.0, 800.0),
            mouse_y: (200.0, 600.0),
            scroll_positions: vec![300, 600, 900, 600, 300, 0],
            scroll_pause: DelayRange::new(200, 500),
            settle_ms: 3_000,
        }
    }
}

/// What the image extraction engine looks at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Single-URL source attributes, highest priority first.
    pub source_attributes: Vec<String>,
    /// Attributes holding `srcset`-style candidate lists.
    pub srcset_attributes: Vec<String>,
    /// Slider/carousel elements whose inline styles get a second look.
    pub slider_selector: String,
    /// Elements sampled for computed background images.
    pub dynamic_selector: String,
    /// How many `dynamic_selector` matches to sample.
    pub dynamic_sample: usize,
    pub lazy_background_attribute: String,
    pub stylesheet_timeout_ms: u64,
    /// Politeness pause before each stylesheet fetch.
    pub stylesheet_delay: DelayRange,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            source_attributes: ["src", "data-src", "data-lazy-src", "data-original"]
                .map(String::from)
                .to_vec(),
            srcset_attributes: ["srcset", "data-srcset"].map(String::from).to_vec(),
            slider_selector:
                ".swiper-slide, .carousel-item, .slide, [class*='slider'], [class*='banner']"
                    .to_string(),
            dynamic_selector: ".swiper-slide, .carousel-item, .slide, [class*='slider'], [class*='banner'], [class*='hero']"
                .to_string(),
            dynamic_sample: 20,
            lazy_background_attribute: "data-bg".to_string(),
            stylesheet_timeout_ms: 8_000,
            stylesheet_delay: DelayRange::new(50, 150),
        }
    }
}

/// Phase 2 input, output and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Pause between consecutive downloads.
    pub job_delay: DelayRange,
    pub chunk_size: usize,
    pub max_filename_len: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("image_files_url.txt"),
            output_dir: PathBuf::from("downloaded_images"),
            timeout_ms: 30_000,
            retry: RetryPolicy::new(3, DelayRange::new(2_000, 5_000)),
            job_delay: DelayRange::new(500, 2_000),
            chunk_size: 8192,
            max_filename_len: 100,
        }
    }
}

/// The configured image extension set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageExtensions(pub Vec<String>);

impl Default for ImageExtensions {
    fn default() -> Self {
        Self(DEFAULT_IMAGE_EXTENSIONS.iter().map(|s| s.to_string()).collect())
    }
}

impl MirrorConfig {
    /// Find the config file to load, if any.
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            if !env_path.is_empty() {
                return Some(PathBuf::from(env_path));
            }
        }

        let cwd = PathBuf::from(DEFAULT_CONFIG_FILE);
        cwd.exists().then_some(cwd)
    }

    /// Load the resolved config file, or the defaults when there is none.
    pub fn load(explicit: Option<&Path>) -> MirrorResult<Self> {
        match Self::resolve_path(explicit) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> MirrorResult<Self> {
        if !path.exists() {
            return Err(MirrorError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|source| MirrorError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn classifier(&self) -> ImageClassifier {
        ImageClassifier::new(&self.image_extensions.0)
    }

    /// `(path, absolute URL)` for every configured page, in order.
    pub fn page_urls(&self) -> MirrorResult<Vec<(String, String)>> {
        let base = Url::parse(&self.site.base_url).map_err(|e| {
            MirrorError::Config(format!("invalid base_url {:?}: {e}", self.site.base_url))
        })?;
        self.site
            .pages
            .iter()
            .map(|path| {
                base.join(path)
                    .map(|u| (path.clone(), u.to_string()))
                    .map_err(|e| MirrorError::Config(format!("invalid page path {path:?}: {e}")))
            })
            .collect()
    }

    /// Check everything Phase 1 needs.
    pub fn validate_discovery(&self) -> MirrorResult<()> {
        if self.site.base_url.trim().is_empty() {
            return invalid("site.base_url is required");
        }
        if self.site.pages.is_empty() {
            return invalid("site.pages must list at least one page");
        }
        self.page_urls()?;
        check_policy("discovery.retry", &self.discovery.retry)?;
        check_policy("discovery.deferred", &self.discovery.deferred)?;
        check_range("discovery.page_delay", &self.discovery.page_delay)?;
        check_range("discovery.stabilize.scroll_pause", &self.discovery.stabilize.scroll_pause)?;
        check_range("extraction.stylesheet_delay", &self.extraction.stylesheet_delay)?;
        let stabilize = &self.discovery.stabilize;
        if stabilize.mouse_x.0 > stabilize.mouse_x.1 || stabilize.mouse_y.0 > stabilize.mouse_y.1 {
            return invalid("discovery.stabilize mouse ranges must be ordered (min, max)");
        }
        self.check_common()
    }

    /// Check everything Phase 2 needs.
    pub fn validate_download(&self) -> MirrorResult<()> {
        check_policy("download.retry", &self.download.retry)?;
        check_range("download.job_delay", &self.download.job_delay)?;
        if self.download.chunk_size == 0 {
            return invalid("download.chunk_size must be positive");
        }
        if self.download.max_filename_len < MIN_FILENAME_LEN {
            return invalid(&format!(
                "download.max_filename_len must be at least {MIN_FILENAME_LEN}"
            ));
        }
        self.check_common()
    }

    fn check_common(&self) -> MirrorResult<()> {
        if self.image_extensions.0.is_empty() {
            return invalid("image_extensions must not be empty");
        }
        if self.headers.user_agents.is_empty() {
            return invalid("headers.user_agents must not be empty");
        }
        Ok(())
    }
}

fn invalid(message: &str) -> MirrorResult<()> {
    Err(MirrorError::Config(message.to_string()))
}

fn check_policy(name: &str, policy: &RetryPolicy) -> MirrorResult<()> {
    if policy.max_attempts == 0 {
        return invalid(&format!("{name}.max_attempts must be at least 1"));
    }
    check_range(&format!("{name}.backoff"), &policy.backoff)?;
    check_range(&format!("{name}.initial_delay"), &policy.initial_delay)
}

fn check_range(name: &str, range: &DelayRange) -> MirrorResult<()> {
    if !range.is_valid() {
        return invalid(&format!(
            "{name}: min_ms ({}) exceeds max_ms ({})",
            range.min_ms, range.max_ms
        ));
    }
    Ok(())
}
