//! Async HTTP client wrapping reqwest.
//!
//! Plain HTTP, no browser. Every call is a single attempt:
//! retry policy belongs to the callers (the stylesheet cache never retries,
//! the download controller retries under its own policy).

use super::headers::HeaderSet;
use anyhow::Result;
use std::time::Duration;

/// Response from a text GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header, lowercased.
    pub content_type: Option<String>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client shared by the stylesheet cache, the static renderer and the
/// download engine.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client whose requests time out after `timeout_ms` unless a
    /// call overrides it.
    pub fn new(timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .connect_timeout(Duration::from_millis(timeout_ms.min(10_000)))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Send a GET and return the response with its body still unread.
    pub async fn send(
        &self,
        url: &str,
        headers: &HeaderSet,
        timeout_ms: u64,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms));

        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder.send().await
    }

    /// GET a text resource. Non-2xx statuses are returned, not raised.
    pub async fn get_text(
        &self,
        url: &str,
        headers: &HeaderSet,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        let r = self.send(url, headers, timeout_ms).await?;
        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let content_type = content_type(&r);
        let body = r.text().await?;

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            body,
        })
    }
}

/// Lowercased Content-Type header of a response.
pub fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new(10000);
        // Just verify it doesn't panic
        let _ = client;
    }

    #[tokio::test]
    async fn test_get_text_sends_headers_and_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/style.css"))
            .and(header("referer", "https://site/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "Text/CSS; charset=utf-8")
                    .set_body_string("body { color: red }"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(5000);
        let headers = vec![("Referer".to_string(), "https://site/page".to_string())];
        let resp = client
            .get_text(&format!("{}/style.css", server.uri()), &headers, 5000)
            .await
            .unwrap();

        assert!(resp.is_success());
        assert_eq!(resp.content_type.as_deref(), Some("text/css; charset=utf-8"));
        assert_eq!(resp.body, "body { color: red }");
    }

    #[tokio::test]
    async fn test_get_text_returns_error_status_without_failing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(5000);
        let resp = client
            .get_text(&format!("{}/missing.css", server.uri()), &Vec::new(), 5000)
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }
}
