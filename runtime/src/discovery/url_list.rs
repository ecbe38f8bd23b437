//! The URL list file that hands Phase 1 results to Phase 2.
//!
//! A block of `#` comment lines, a blank line, then one absolute URL per
//! line in ascending order.

use crate::error::{MirrorError, MirrorResult};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

/// Write the sorted URL list with its header block.
pub fn write_url_list(path: &Path, base_url: &str, urls: &BTreeSet<String>) -> MirrorResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(out, "# Image URLs scraped from {base_url}")?;
    writeln!(out, "# Total images found: {}", urls.len())?;
    writeln!(
        out,
        "# Scraped on: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out)?;
    for url in urls {
        writeln!(out, "{url}")?;
    }
    out.flush()?;
    Ok(())
}

/// A line of the list that is neither a comment nor a URL.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RejectedLine {
    /// 1-based.
    pub line_number: usize,
    pub content: String,
}

/// URLs read from a list file, in file order.
#[derive(Debug, Clone, Default)]
pub struct UrlList {
    pub urls: Vec<String>,
    pub rejected: Vec<RejectedLine>,
}

/// Read a URL list. Blank and `#` lines are ignored; lines without an
/// `http://` or `https://` scheme are rejected with a warning.
pub fn read_url_list(path: &Path) -> MirrorResult<UrlList> {
    if !path.exists() {
        return Err(MirrorError::MissingInput(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    Ok(parse_url_list(&text))
}

pub fn parse_url_list(text: &str) -> UrlList {
    let mut list = UrlList::default();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with("http://") || line.starts_with("https://") {
            list.urls.push(line.to_string());
        } else {
            tracing::warn!("line {}: not a URL, skipping: {line}", idx + 1);
            list.rejected.push(RejectedLine {
                line_number: idx + 1,
                content: line.to_string(),
            });
        }
    }
    list
}
