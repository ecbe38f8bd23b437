//! URL classification: is a candidate URL an image?
//!
//! Classification looks only at the path suffix after dropping the query
//! string and fragment, so `photo.PNG?v=2#top` is an image and
//! `/thumb?src=a.png` is not.

use url::Url;

/// Extensions recognized when no custom set is configured.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".avif", ".bmp", ".ico",
];

/// Check a URL against the default extension set.
pub fn is_image_url(url: &str) -> bool {
    path_has_extension(url, DEFAULT_IMAGE_EXTENSIONS.iter().copied())
}

/// Classifier over a configured extension set.
#[derive(Debug, Clone)]
pub struct ImageClassifier {
    extensions: Vec<String>,
}

impl ImageClassifier {
    /// Build a classifier. Extensions are lowercased and given a leading dot
    /// when it is missing, so `"PNG"` and `".png"` are equivalent.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim().to_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .filter(|e| e.len() > 1)
            .collect();
        Self { extensions }
    }

    pub fn is_image_url(&self, url: &str) -> bool {
        path_has_extension(url, self.extensions.iter().map(String::as_str))
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Default for ImageClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_EXTENSIONS)
    }
}

fn path_has_extension<'a>(url: &str, mut extensions: impl Iterator<Item = &'a str>) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }

    let stripped = url.split('?').next().unwrap_or(url);
    let stripped = stripped.split('#').next().unwrap_or(stripped);

    // Absolute URLs are judged by their path alone, so a host such as
    // `cdn.png` never counts. Anything unparsable is judged as a bare path.
    let path = match Url::parse(stripped) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => stripped.to_lowercase(),
    };

    extensions.any(|ext| path.ends_with(ext))
}
