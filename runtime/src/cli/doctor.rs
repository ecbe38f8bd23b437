//! Environment readiness check.

use crate::cli::output::{self, Styled};
use crate::config::MirrorConfig;
use crate::renderer::chromium::find_chromium;
use crate::renderer::RendererKind;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

impl Check {
    fn new(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            detail: detail.into(),
        }
    }
}

/// Check Chromium availability, configuration, input and output locations.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let mut checks = Vec::new();

    let resolved = MirrorConfig::resolve_path(config_path);
    let config = match MirrorConfig::load(config_path) {
        Ok(config) => {
            let source = resolved
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in defaults".to_string());
            checks.push(Check::new("config", true, format!("loaded from {source}")));
            config
        }
        Err(e) => {
            checks.push(Check::new("config", false, e.to_string()));
            MirrorConfig::default()
        }
    };

    let chromium = find_chromium(config.browser.chromium_path.as_deref());
    let static_only = config.browser.renderer == RendererKind::Static;
    checks.push(match &chromium {
        Some(path) => Check::new("chromium", true, path.display().to_string()),
        None if static_only => Check::new("chromium", true, "not needed (static renderer)"),
        None => Check::new(
            "chromium",
            false,
            "not found; set PIXMIRROR_CHROMIUM_PATH or browser.chromium_path (discovery will fall back to the static renderer)",
        ),
    });

    checks.push(match config.validate_discovery() {
        Ok(()) => Check::new(
            "discovery",
            true,
            format!("{} page(s) on {}", config.site.pages.len(), config.site.base_url),
        ),
        Err(e) => Check::new("discovery", false, e.to_string()),
    });

    checks.push(match config.validate_download() {
        Ok(()) => Check::new("download", true, "settings valid"),
        Err(e) => Check::new("download", false, e.to_string()),
    });

    let input = &config.download.input_file;
    checks.push(if input.exists() {
        Check::new("input", true, input.display().to_string())
    } else {
        Check::new(
            "input",
            false,
            format!("{} missing (run `pixmirror discover` first)", input.display()),
        )
    });

    checks.push(output_dir_check(&config.download.output_dir));

    let ready = checks.iter().all(|c| c.ok || c.name == "input");

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "version": env!("CARGO_PKG_VERSION"),
            "checks": checks,
            "ready": ready,
        }));
        return Ok(());
    }

    let s = Styled::new();
    println!("pixmirror doctor");
    println!("================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();
    for check in &checks {
        let sym = if check.ok { s.ok_sym() } else { s.warn_sym() };
        println!("[{sym}] {:<10} {}", check.name, check.detail);
    }
    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}

fn output_dir_check(dir: &Path) -> Check {
    if !dir.exists() {
        let parent = dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        return if parent.exists() {
            Check::new("output", true, format!("{} will be created", dir.display()))
        } else {
            Check::new(
                "output",
                false,
                format!("parent of {} does not exist", dir.display()),
            )
        };
    }

    let marker = dir.join(".pixmirror-write-test");
    match std::fs::write(&marker, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
            Check::new("output", true, format!("{} is writable", dir.display()))
        }
        Err(e) => Check::new("output", false, format!("{} not writable: {e}", dir.display())),
    }
}
