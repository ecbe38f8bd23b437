//! Request header templates and the user-agent pool.
//!
//! `Accept-Encoding` is never part of a template: reqwest
//! negotiates compression itself and only decodes bodies it asked for.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name/value pairs sent with one request.
pub type HeaderSet = Vec<(String, String)>;

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/121.0",
];

/// Header templates per request kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// User agents. The first one is the browser's identity; downloads
    /// rotate through all of them.
    pub user_agents: Vec<String>,
    /// Sent with page documents (browser context and static renderer).
    pub document: BTreeMap<String, String>,
    /// Sent with stylesheet fetches.
    pub stylesheet: BTreeMap<String, String>,
    /// Sent with image downloads.
    pub image: BTreeMap<String, String>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            document: template(&[
                (
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
                ),
                ("Accept-Language", "en-US,en;q=0.9"),
                ("DNT", "1"),
                ("Upgrade-Insecure-Requests", "1"),
                ("Sec-Fetch-Dest", "document"),
                ("Sec-Fetch-Mode", "navigate"),
                ("Sec-Fetch-Site", "none"),
                ("Cache-Control", "max-age=0"),
            ]),
            stylesheet: template(&[
                ("Accept", "text/css,*/*;q=0.1"),
                ("Accept-Language", "en-US,en;q=0.9"),
                ("Cache-Control", "no-cache"),
            ]),
            image: template(&[
                (
                    "Accept",
                    "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8",
                ),
                ("Accept-Language", "en-US,en;q=0.9"),
                ("DNT", "1"),
                ("Upgrade-Insecure-Requests", "1"),
                ("Sec-Fetch-Dest", "image"),
                ("Sec-Fetch-Mode", "no-cors"),
                ("Sec-Fetch-Site", "cross-site"),
                ("Cache-Control", "no-cache"),
                ("Pragma", "no-cache"),
            ]),
        }
    }
}

impl HeaderConfig {
    /// The identity the browser presents.
    pub fn primary_user_agent(&self) -> &str {
        self.user_agents
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }

    /// A user agent picked at random from the pool.
    pub fn random_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }

    pub fn document_headers(&self) -> HeaderSet {
        with_user_agent(&self.document, self.primary_user_agent())
    }

    /// Stylesheet request headers; `referer` is the page that links the sheet.
    pub fn stylesheet_headers(&self, referer: &str) -> HeaderSet {
        let mut headers = with_user_agent(&self.stylesheet, self.primary_user_agent());
        if !referer.is_empty() {
            headers.push(("Referer".to_string(), referer.to_string()));
        }
        headers
    }

    /// Image request headers with a freshly rotated user agent.
    pub fn image_headers(&self) -> HeaderSet {
        with_user_agent(&self.image, self.random_user_agent())
    }
}

fn template(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn with_user_agent(base: &BTreeMap<String, String>, user_agent: &str) -> HeaderSet {
    let mut headers: HeaderSet = vec![("User-Agent".to_string(), user_agent.to_string())];
    headers.extend(
        base.iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("user-agent"))
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    headers
}
