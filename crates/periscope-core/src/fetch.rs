//! Outbound content fetching.
//!
//! A single shared [`Fetcher`] issues every upstream request: one GET per
//! invocation with a fixed identifying User-Agent, a small allow-listed set
//! of forwarded client headers, a hard time budget, and a hard body size
//! ceiling. Redirects are resolved transparently and the final URL is
//! retained so rewriting always works against the canonical destination.
//!
//! There is deliberately no cache and no retry here; a failed fetch is
//! classified once and surfaced to the caller.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::redirect;
use url::Url;

use crate::error::{FetchError, Result};

/// Default time budget for a single fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default response body ceiling (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Maximum number of redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Identifying User-Agent sent with every upstream request.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Periscope/0.2; +https://github.com/periscope/periscope)";

/// Client request headers forwarded to the target.
///
/// Everything else from the inbound request is dropped so client identity
/// (cookies, authorization, custom headers) never leaks upstream.
pub const FORWARDED_HEADERS: &[&str] = &["accept", "accept-language", "accept-encoding"];

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Hard time budget for the whole request.
    pub timeout: Duration,
    /// Hard ceiling on the response body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl FetchConfig {
    /// Sets the fetch time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the body size ceiling.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// A completed upstream fetch.
#[derive(Debug)]
pub struct FetchedResponse {
    /// Upstream HTTP status.
    pub status: u16,
    /// Final URL after redirect resolution.
    pub final_url: Url,
    /// Upstream `Content-Type`, or `application/octet-stream` if absent.
    pub content_type: String,
    /// Raw upstream response headers.
    pub headers: HeaderMap,
    /// Response body, bounded by the configured ceiling.
    pub body: Vec<u8>,
    /// Wall-clock time the fetch took.
    pub elapsed: Duration,
}

impl FetchedResponse {
    /// Whether the response is an HTML document.
    pub fn is_html(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        ct.contains("text/html") || ct.contains("application/xhtml")
    }

    /// Whether the response is a stylesheet.
    pub fn is_css(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("text/css")
    }

    /// Whether the body arrived with a content encoding still applied.
    ///
    /// Such bodies are opaque bytes to the rewriter and must be relayed
    /// untouched.
    pub fn is_content_encoded(&self) -> bool {
        self.headers
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|value| !value.eq_ignore_ascii_case("identity"))
            .unwrap_or(false)
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Issues upstream requests on behalf of proxy clients.
pub struct Fetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl Fetcher {
    /// Creates a fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Creates a fetcher with default settings.
    pub fn with_defaults() -> reqwest::Result<Self> {
        Self::new(FetchConfig::default())
    }

    /// Returns the configured body ceiling.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Fetches the target URL with a single GET.
    ///
    /// Only [`FORWARDED_HEADERS`] are copied from `client_headers`. The
    /// body is read in chunks and the fetch fails with an oversize error
    /// the moment it would exceed the ceiling.
    pub async fn fetch(&self, url: &str, client_headers: &HeaderMap) -> Result<FetchedResponse> {
        let started = Instant::now();

        let mut request = self.client.get(url);
        for name in FORWARDED_HEADERS {
            if let Some(value) = client_headers.get(*name) {
                request = request.header(*name, value);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|err| FetchError::from_transport(url, &err))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(FetchError::OversizedContent {
                    limit: self.max_body_bytes,
                });
            }
        }

        let mut response = response;
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| FetchError::from_transport(url, &err))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::OversizedContent {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        let elapsed = started.elapsed();
        tracing::debug!(
            url = %final_url,
            status,
            content_type = %content_type,
            bytes = body.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Fetched target"
        );

        Ok(FetchedResponse {
            status,
            final_url,
            content_type,
            headers,
            body,
            elapsed,
        })
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(config: FetchConfig) -> Fetcher {
        Fetcher::new(config).expect("client builds")
    }

    #[tokio::test]
    async fn fetch_returns_body_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let fetched = fetcher(FetchConfig::default())
            .fetch(&format!("{}/page", server.uri()), &HeaderMap::new())
            .await
            .unwrap();

        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.body, b"<html></html>");
        assert!(fetched.is_html());
        assert!(!fetched.is_css());
        assert!(fetched.final_url.as_str().ends_with("/page"));
    }

    #[tokio::test]
    async fn fetch_resolves_redirects_to_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "/destination"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/destination"))
            .respond_with(ResponseTemplate::new(200).set_body_string("arrived"))
            .mount(&server)
            .await;

        let fetched = fetcher(FetchConfig::default())
            .fetch(&format!("{}/start", server.uri()), &HeaderMap::new())
            .await
            .unwrap();

        assert_eq!(fetched.status, 200);
        assert!(fetched.final_url.as_str().ends_with("/destination"));
        assert_eq!(fetched.body, b"arrived");
    }

    #[tokio::test]
    async fn fetch_forwards_only_allow_listed_headers() {
        let server = MockServer::start().await;
        // A leaked cookie matches the higher-priority 500 mock.
        Mock::given(method("GET"))
            .and(path("/echo"))
            .and(header("cookie", "secret=1"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/echo"))
            .and(header("accept-language", "fr"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut client_headers = HeaderMap::new();
        client_headers.insert("accept-language", "fr".parse().unwrap());
        client_headers.insert("cookie", "secret=1".parse().unwrap());

        let fetched = fetcher(FetchConfig::default())
            .fetch(&format!("{}/echo", server.uri()), &client_headers)
            .await
            .unwrap();

        assert_eq!(fetched.status, 200);
    }

    #[tokio::test]
    async fn fetch_rejects_oversized_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;

        let err = fetcher(FetchConfig::default().with_max_body_bytes(1024))
            .fetch(&format!("{}/big", server.uri()), &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::OversizedContent { limit: 1024 }));
        assert_eq!(err.status(), 415);
        assert_eq!(err.code(), "UNSUPPORTED_CONTENT");
    }

    #[tokio::test]
    async fn fetch_times_out_on_slow_targets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = fetcher(FetchConfig::default().with_timeout(Duration::from_millis(200)))
            .fetch(&format!("{}/slow", server.uri()), &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::ConnectionTimeout { .. }));
        assert_eq!(err.code(), "CONNECTION_TIMEOUT");
    }

    #[tokio::test]
    async fn fetch_classifies_refused_connections() {
        // Bind to grab a free port, then drop the listener so nothing is
        // listening when the fetch connects.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = fetcher(FetchConfig::default())
            .fetch(&format!("http://127.0.0.1:{port}/"), &HeaderMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::ConnectionRefused { .. }));
        assert_eq!(err.status(), 502);
        assert_eq!(err.code(), "CONNECTION_REFUSED");
    }
}
