//! `pixmirror download` runs Phase 2 and mirrors the URL list to disk.

use crate::cli::output::{self, format_bytes, Styled};
use crate::cli::{shutdown_on_ctrl_c, DownloadOverrides};
use crate::config::MirrorConfig;
use crate::download::{run_download, DownloadReport};
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, overrides: &DownloadOverrides) -> Result<()> {
    let mut config = MirrorConfig::load(config_path)?;
    overrides.apply(&mut config);

    let report = run_download(&config, Some(shutdown_on_ctrl_c())).await?;
    print_summary(&report);
    Ok(())
}

pub(crate) fn print_summary(report: &DownloadReport) {
    if output::is_json() {
        output::print_json(report);
        return;
    }
    if output::is_quiet() {
        return;
    }

    let s = Styled::new();
    println!();
    println!("  {}", s.bold("Download summary"));
    println!(
        "  {} {} downloaded ({})",
        s.ok_sym(),
        report.downloaded,
        format_bytes(report.bytes_written)
    );
    println!("  {} {} already present", s.ok_sym(), report.skipped);
    if report.failed > 0 {
        println!("  {} {} failed", s.fail_sym(), report.failed);
        for job in report.failed_jobs() {
            println!(
                "      {} {}",
                job.url,
                s.dim(job.error.as_deref().unwrap_or_default())
            );
        }
    }
    if !report.rejected_lines.is_empty() {
        println!(
            "  {} {} input lines were not URLs",
            s.warn_sym(),
            report.rejected_lines.len()
        );
    }
    if report.interrupted {
        println!("  {} interrupted, completed files kept", s.warn_sym());
    }

    let tree = &report.tree;
    println!(
        "  {} files ({}) in {}",
        tree.files,
        format_bytes(tree.total_bytes),
        report.output_dir.display()
    );
    for dir in &tree.preview {
        let name = if dir.directory.as_os_str().is_empty() {
            ".".to_string()
        } else {
            dir.directory.display().to_string()
        };
        println!("    {name}/");
        for file in &dir.files {
            println!("      {file}");
        }
        if dir.more > 0 {
            println!("      {}", s.dim(&format!("... and {} more", dir.more)));
        }
    }
    if tree.directories > tree.preview.len() {
        println!(
            "    {}",
            s.dim(&format!(
                "... and {} more directories",
                tree.directories - tree.preview.len()
            ))
        );
    }
}
