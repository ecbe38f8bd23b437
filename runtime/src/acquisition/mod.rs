//! HTTP acquisition outside the browser.
//!
//! Stylesheets, static pages and image downloads are all fetched through
//! `HttpClient`, with request headers built from the configured templates.

pub mod headers;
pub mod http_client;
