//! Application state for the API server.

use std::sync::Arc;

use periscope_core::Fetcher;

/// Shared application state.
///
/// The fetcher's pooled HTTP client is the only state shared between
/// requests; everything else is computed per-request.
#[derive(Clone)]
pub struct AppState {
    /// Outbound content fetcher.
    pub fetcher: Arc<Fetcher>,
    /// The proxy's own externally-reachable base URL, no trailing slash.
    public_url: Arc<String>,
}

impl AppState {
    /// Creates application state from a fetcher and the proxy base URL.
    pub fn new(fetcher: Fetcher, public_url: impl Into<String>) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        Self {
            fetcher: Arc::new(fetcher),
            public_url: Arc::new(public_url),
        }
    }

    /// The base URL rewritten resource references point at.
    pub fn public_url(&self) -> &str {
        &self.public_url
    }
}
