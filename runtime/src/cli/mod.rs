//! CLI subcommand implementations for the pixmirror binary.

pub mod discover_cmd;
pub mod doctor;
pub mod download_cmd;
pub mod output;
pub mod run_cmd;

use crate::config::MirrorConfig;
use crate::renderer::RendererKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;

/// Phase 1 flags that override the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct DiscoverOverrides {
    pub base_url: Option<String>,
    pub output: Option<PathBuf>,
    pub renderer: Option<RendererKind>,
    pub headful: bool,
}

impl DiscoverOverrides {
    pub fn apply(&self, config: &mut MirrorConfig) {
        if let Some(base_url) = &self.base_url {
            config.site.base_url = base_url.clone();
        }
        if let Some(output) = &self.output {
            config.discovery.output_file = output.clone();
        }
        if let Some(renderer) = self.renderer {
            config.browser.renderer = renderer;
        }
        if self.headful {
            config.browser.headless = false;
        }
    }
}

/// Phase 2 flags that override the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct DownloadOverrides {
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl DownloadOverrides {
    pub fn apply(&self, config: &mut MirrorConfig) {
        if let Some(input) = &self.input {
            config.download.input_file = input.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.download.output_dir = output_dir.clone();
        }
    }
}

/// A handle notified when the user presses Ctrl-C. The first press lets the
/// running phase stop cleanly; a second press exits at once with status 130.
pub fn shutdown_on_ctrl_c() -> Arc<Notify> {
    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        let ctrl_c = || async { tokio::signal::ctrl_c().await.is_ok() };
        if relay_interrupts(ctrl_c, signal).await {
            tracing::warn!("second interrupt, exiting without cleanup");
            std::process::exit(130);
        }
    });
    shutdown
}

/// Forward interrupts from `next_signal` to `shutdown`. Returns true when a
/// second interrupt arrives before the signal source closes.
async fn relay_interrupts<F, Fut>(mut next_signal: F, shutdown: Arc<Notify>) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    if !next_signal().await {
        return false;
    }
    tracing::info!("received interrupt, finishing up (press Ctrl-C again to quit now)");
    shutdown.notify_one();
    next_signal().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let shutdown = Arc::new(Notify::new());
        let forced = relay_interrupts(|| async { true }, Arc::clone(&shutdown)).await;
        assert!(forced);
        // The first interrupt left a permit for whoever waits next.
        tokio::time::timeout(Duration::from_secs(1), shutdown.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_single_interrupt_only_notifies() {
        let shutdown = Arc::new(Notify::new());
        let calls = AtomicUsize::new(0);
        let forced = relay_interrupts(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { n == 0 }
            },
            Arc::clone(&shutdown),
        )
        .await;
        assert!(!forced);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        tokio::time::timeout(Duration::from_secs(1), shutdown.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_signal_source_never_notifies() {
        let shutdown = Arc::new(Notify::new());
        assert!(!relay_interrupts(|| async { false }, Arc::clone(&shutdown)).await);
        let waited = tokio::time::timeout(Duration::from_millis(50), shutdown.notified()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = MirrorConfig::default();
        DiscoverOverrides {
            base_url: Some("https://x.test".to_string()),
            output: Some(PathBuf::from("urls.txt")),
            renderer: Some(RendererKind::Static),
            headful: true,
        }
        .apply(&mut config);
        DownloadOverrides {
            input: None,
            output_dir: Some(PathBuf::from("mirror")),
        }
        .apply(&mut config);

        assert_eq!(config.site.base_url, "https://x.test");
        assert_eq!(config.discovery.output_file, PathBuf::from("urls.txt"));
        assert_eq!(config.browser.renderer, RendererKind::Static);
        assert!(!config.browser.headless);
        assert_eq!(config.download.input_file, PathBuf::from("image_files_url.txt"));
        assert_eq!(config.download.output_dir, PathBuf::from("mirror"));
    }
}
