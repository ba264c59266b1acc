//! Target URL encoding and validation.
//!
//! Target URLs travel in query strings and JSON bodies, so they are
//! transported as URL-safe Base64 tokens (standard alphabet with `+`→`-`,
//! `/`→`_`, padding stripped). Validation enforces the proxy's admission
//! policy: http(s) only, and no loopback or obviously-private hosts.
//!
//! ## Usage
//!
//! ```
//! use periscope_core::codec;
//!
//! let token = codec::encode("https://example.com/path?q=1");
//! assert_eq!(codec::decode(&token).unwrap(), "https://example.com/path?q=1");
//! assert!(codec::validate("https://example.com/path?q=1"));
//! assert!(!codec::validate("http://localhost/"));
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;
use url::Url;

/// Hostnames that are never fetched, regardless of scheme.
pub const BLOCKED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "::1", "[::1]"];

/// Coarse private-range prefixes.
///
/// This is intentionally a prefix check, not full RFC1918/CIDR matching:
/// `172.17.x.x` and DNS names resolving to private space pass through.
pub const BLOCKED_PREFIXES: &[&str] = &["10.", "172.16.", "192.168."];

/// Sentinel returned by [`extract_domain`] when the URL cannot be parsed.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Errors produced when decoding an encoded target reference.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The token contains characters outside the URL-safe alphabet or has
    /// an impossible length.
    #[error("token is not valid URL-safe base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The decoded bytes are not a UTF-8 string.
    #[error("decoded token is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Encodes an absolute URL as a URL-safe Base64 token without padding.
///
/// Empty input yields empty output. Encoding depends only on the input,
/// never on request state.
pub fn encode(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}

/// Decodes a token produced by [`encode`] back into the original URL.
///
/// Trailing `=` padding is tolerated so tokens survive transports that
/// re-pad them.
pub fn decode(token: &str) -> Result<String> {
    if token.is_empty() {
        return Ok(String::new());
    }
    let bytes = URL_SAFE_NO_PAD.decode(token.trim_end_matches('='))?;
    Ok(String::from_utf8(bytes)?)
}

/// Checks whether a URL is an acceptable fetch target.
///
/// Requires a parseable absolute URL with scheme `http` or `https` and a
/// hostname outside [`BLOCKED_HOSTS`] and [`BLOCKED_PREFIXES`].
pub fn validate(url: &str) -> bool {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let host = match parsed.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return false,
    };

    if BLOCKED_HOSTS.contains(&host.as_str()) {
        return false;
    }
    if BLOCKED_PREFIXES.iter().any(|prefix| host.starts_with(prefix)) {
        return false;
    }

    true
}

/// Best-effort hostname extraction for display and logging.
///
/// Returns [`UNKNOWN_DOMAIN`] instead of failing on unparseable input.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}
