//! `pixmirror run`: discovery, then download of what it found.

use crate::cli::output::{self, Styled};
use crate::cli::{discover_cmd, download_cmd, shutdown_on_ctrl_c};
use crate::cli::{DiscoverOverrides, DownloadOverrides};
use crate::config::MirrorConfig;
use crate::download::run_download;
use anyhow::Result;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    discover: &DiscoverOverrides,
    download: &DownloadOverrides,
) -> Result<()> {
    let mut config = MirrorConfig::load(config_path)?;
    discover.apply(&mut config);
    download.apply(&mut config);
    // Phase 2 reads exactly what Phase 1 wrote.
    config.download.input_file = config.discovery.output_file.clone();
    config.validate_download()?;

    let shutdown = shutdown_on_ctrl_c();
    let found = discover_cmd::discover(&config, shutdown.clone()).await?;

    if found.report.interrupted {
        if output::is_json() {
            output::print_json(&serde_json::json!({
                "discovery": found.report,
                "download": serde_json::Value::Null,
            }));
        } else {
            discover_cmd::print_summary(&config, &found);
            if !output::is_quiet() {
                eprintln!(
                    "  {} Skipping downloads after interruption.",
                    Styled::stderr().warn_sym()
                );
            }
        }
        return Ok(());
    }

    let report = run_download(&config, Some(shutdown)).await?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "discovery": found.report,
            "download": report,
        }));
    } else {
        discover_cmd::print_summary(&config, &found);
        download_cmd::print_summary(&report);
    }
    Ok(())
}
