//! Map image URLs onto a local directory tree mirroring the URL path.
//!
//! `https://x/a/b/photo.jpg` lands at `a/b/photo.jpg` under the download
//! root. A path without a usable filename gets `image_<hash><ext>`, where the
//! hash is the first 8 hex digits of the SHA-256 of the whole URL, so the
//! same URL always maps to the same file.

use crate::classify::DEFAULT_IMAGE_EXTENSIONS;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\'];
const REPLACEMENT: char = '_';
const FALLBACK_EXTENSION: &str = ".jpg";

/// Filesystem limit on one path component (`NAME_MAX`), in bytes.
const MAX_FILENAME_BYTES: usize = 255;

/// Where one URL is stored, relative to the download root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirroredPath {
    pub directory: PathBuf,
    pub filename: String,
}

impl MirroredPath {
    pub fn relative_path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(self.relative_path())
    }
}

#[derive(Debug, Clone)]
pub struct PathMapper {
    max_filename_len: usize,
    extensions: Vec<String>,
}

impl PathMapper {
    pub fn new(max_filename_len: usize) -> Self {
        Self {
            max_filename_len,
            extensions: DEFAULT_IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Extensions a synthesized filename may take, matched in order.
    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        if !extensions.is_empty() {
            self.extensions = extensions.to_vec();
        }
        self
    }

    pub fn map(&self, url: &str) -> MirroredPath {
        let decoded = Url::parse(url)
            .map(|u| decode_path(u.path()))
            .unwrap_or_default();

        let mut segments: Vec<String> = decoded
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(sanitize_segment)
            .collect();

        // A trailing slash means there is no filename.
        let filename = if decoded.ends_with('/') {
            None
        } else {
            segments.pop()
        };

        let filename = match filename {
            Some(name) if name.contains('.') && !name.trim_matches('.').is_empty() => name,
            _ => self.synthesized_filename(url),
        };

        MirroredPath {
            directory: segments.iter().collect(),
            filename: truncate_filename(&filename, self.max_filename_len),
        }
    }
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::new(100)
    }
}

fn decode_path(path: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(path.as_bytes())).into_owned()
}

fn sanitize_segment(segment: &str) -> String {
    if segment == ".." {
        return REPLACEMENT.to_string();
    }
    segment
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || c.is_control() {
                REPLACEMENT
            } else {
                c
            }
        })
        .collect()
}

impl PathMapper {
    fn synthesized_filename(&self, url: &str) -> String {
        let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
        let lower = url.to_lowercase();
        let ext = self
            .extensions
            .iter()
            .map(String::as_str)
            .find(|ext| lower.contains(ext))
            .unwrap_or(FALLBACK_EXTENSION);
        format!("image_{}{ext}", &digest[..8])
    }
}

/// Shorten `filename` to at most `max_len` characters and
/// `MAX_FILENAME_BYTES` bytes, keeping its extension.
fn truncate_filename(filename: &str, max_len: usize) -> String {
    if filename.chars().count() <= max_len && filename.len() <= MAX_FILENAME_BYTES {
        return filename.to_string();
    }
    let (stem, ext) = match filename.rfind('.') {
        Some(dot) if dot > 0 && filename.len() - dot < MAX_FILENAME_BYTES => {
            filename.split_at(dot)
        }
        _ => (filename, ""),
    };
    let keep_chars = max_len.saturating_sub(ext.chars().count()).max(1);
    let keep_bytes = MAX_FILENAME_BYTES - ext.len();

    let mut end = 0;
    for (i, (offset, c)) in stem.char_indices().enumerate() {
        if i >= keep_chars || offset + c.len_utf8() > keep_bytes {
            break;
        }
        end = offset + c.len_utf8();
    }
    format!("{}{ext}", &stem[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(url: &str) -> MirroredPath {
        PathMapper::default().map(url)
    }

    #[test]
    fn test_mirrors_url_path() {
        let p = map("https://x/a/b/photo.jpg");
        assert_eq!(p.directory, PathBuf::from("a/b"));
        assert_eq!(p.filename, "photo.jpg");
        assert_eq!(p.relative_path(), PathBuf::from("a/b/photo.jpg"));
    }

    #[test]
    fn test_query_does_not_reach_filename() {
        let p = map("https://x/img/logo.png?v=3#top");
        assert_eq!(p.relative_path(), PathBuf::from("img/logo.png"));
    }

    #[test]
    fn test_percent_decoding() {
        let p = map("https://x/my%20photos/caf%C3%A9.jpg");
        assert_eq!(p.directory, PathBuf::from("my photos"));
        assert_eq!(p.filename, "café.jpg");
    }

    #[test]
    fn test_illegal_characters_replaced() {
        let p = map("https://x/a%3Ab/we%22ird%7C%2A.png");
        assert_eq!(p.directory, PathBuf::from("a_b"));
        assert_eq!(p.filename, "we_ird__.png");
    }

    #[test]
    fn test_encoded_traversal_stays_inside_root() {
        let p = map("https://x/a/%2E%2E/%2e%2e/secret.png");
        assert!(!p.relative_path().components().any(|c| c == std::path::Component::ParentDir));
        assert_eq!(p.filename, "secret.png");

        let p = map("https://x/a%2F..%2Fsecret.png");
        assert_eq!(p.directory, PathBuf::from("a/_"));
        assert_eq!(p.filename, "secret.png");
    }

    #[test]
    fn test_synthesized_names_are_deterministic_and_distinct() {
        let a = map("https://x/gallery/thumb?id=1");
        let b = map("https://x/gallery/thumb?id=2");
        assert_eq!(a, map("https://x/gallery/thumb?id=1"));
        assert_ne!(a.filename, b.filename);
        assert_eq!(a.directory, PathBuf::from("gallery"));
        assert!(a.filename.starts_with("image_"));
        assert_eq!(a.filename.len(), "image_".len() + 8 + ".jpg".len());
    }

    #[test]
    fn test_synthesized_extension_from_url() {
        assert!(map("https://x/render?format=.webp").filename.ends_with(".webp"));
        assert!(map("https://x/").filename.ends_with(".jpg"));
        assert!(map("https://x/dir/").filename.starts_with("image_"));
        assert_eq!(map("https://x/dir/").directory, PathBuf::from("dir"));
    }

    #[test]
    fn test_long_names_truncated_keeping_extension() {
        let long = "a".repeat(150);
        let p = map(&format!("https://x/{long}.jpeg"));
        assert_eq!(p.filename.chars().count(), 100);
        assert!(p.filename.ends_with(".jpeg"));

        let p = PathMapper::new(20).map(&format!("https://x/{}.png", "é".repeat(30)));
        assert_eq!(p.filename.chars().count(), 20);
        assert!(p.filename.ends_with(".png"));
    }

    #[test]
    fn test_multibyte_names_fit_name_max() {
        let p = map(&format!("https://x/{}.jpg", "😀".repeat(150)));
        assert!(p.filename.len() <= MAX_FILENAME_BYTES);
        assert!(p.filename.ends_with(".jpg"));
        assert_eq!(p.filename, format!("{}.jpg", "😀".repeat(62)));

        let p = PathMapper::new(300).map(&format!("https://x/{}.png", "é".repeat(200)));
        assert!(p.filename.len() <= MAX_FILENAME_BYTES);
        assert!(p.filename.ends_with(".png"));
    }

    #[test]
    fn test_synthesized_extension_from_configured_set() {
        let mapper = PathMapper::new(100).with_extensions(&[".jxl".to_string(), ".png".to_string()]);
        assert!(mapper.map("https://x/render/photo.jxl/").filename.ends_with(".jxl"));
        assert!(map("https://x/render/photo.jxl/").filename.ends_with(".jpg"));
        assert!(mapper.map("https://x/thumb?f=webp").filename.ends_with(".jpg"));
    }
}
