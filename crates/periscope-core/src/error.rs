//! Classified fetch failures.
//!
//! Every transport failure is mapped to a fixed taxonomy at the boundary
//! where it occurs, so callers always receive a stable
//! (code, status, message, suggestions) tuple instead of a raw transport
//! error. The 400-vs-502 split is deliberate: 400 means the request
//! itself was malformed, 502 means the target could not be reached.

use thiserror::Error;

/// A classified failure from the fetch pipeline.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The target URL failed validation.
    #[error("invalid or disallowed target URL: {url}")]
    InvalidUrl {
        /// The rejected URL as supplied by the client.
        url: String,
    },

    /// The target hostname could not be resolved.
    #[error("DNS lookup failed for {url}")]
    DnsLookupFailed { url: String },

    /// The target actively refused the connection.
    #[error("connection refused by {url}")]
    ConnectionRefused { url: String },

    /// The request exceeded the fetch time budget.
    #[error("connection to {url} timed out")]
    ConnectionTimeout { url: String },

    /// The peer reset the connection mid-flight.
    #[error("connection to {url} was reset")]
    ConnectionReset { url: String },

    /// The target presented an expired TLS certificate.
    #[error("TLS certificate for {url} has expired")]
    SslCertExpired { url: String },

    /// The response content type is outside the accepted envelope.
    #[error("unsupported content type: {content_type}")]
    UnsupportedContent { content_type: String },

    /// The response body exceeds the configured size ceiling.
    #[error("response body exceeds the {limit} byte limit")]
    OversizedContent { limit: usize },

    /// Any other transport-level failure.
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Stable machine code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl { .. } => "INVALID_URL",
            FetchError::DnsLookupFailed { .. } => "DNS_LOOKUP_FAILED",
            FetchError::ConnectionRefused { .. } => "CONNECTION_REFUSED",
            FetchError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            FetchError::ConnectionReset { .. } => "CONNECTION_RESET",
            FetchError::SslCertExpired { .. } => "SSL_CERT_EXPIRED",
            FetchError::UnsupportedContent { .. } | FetchError::OversizedContent { .. } => {
                "UNSUPPORTED_CONTENT"
            }
            FetchError::Network { .. } => "NETWORK_ERROR",
        }
    }

    /// HTTP status the failure maps to.
    pub fn status(&self) -> u16 {
        match self {
            FetchError::InvalidUrl { .. } => 400,
            FetchError::UnsupportedContent { .. } | FetchError::OversizedContent { .. } => 415,
            _ => 502,
        }
    }

    /// Fixed human explanation for the failure kind.
    pub fn explanation(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl { .. } => {
                "The requested URL is not valid or points to a disallowed destination."
            }
            FetchError::DnsLookupFailed { .. } => "The domain name could not be resolved.",
            FetchError::ConnectionRefused { .. } => "The target server refused the connection.",
            FetchError::ConnectionTimeout { .. } => {
                "The target server did not respond within the time budget."
            }
            FetchError::ConnectionReset { .. } => {
                "The connection was closed unexpectedly by the target server."
            }
            FetchError::SslCertExpired { .. } => "The target site's TLS certificate has expired.",
            FetchError::UnsupportedContent { .. } => {
                "The target returned a content type this endpoint does not serve."
            }
            FetchError::OversizedContent { .. } => {
                "The response is larger than the configured size ceiling."
            }
            FetchError::Network { .. } => "The target could not be reached.",
        }
    }

    /// Ordered remediation suggestions for the failure kind.
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            FetchError::InvalidUrl { .. } => &[
                "Check the URL for typos",
                "Only http:// and https:// URLs can be proxied",
                "Private and loopback addresses are not allowed",
            ],
            FetchError::DnsLookupFailed { .. } => &[
                "Check that the domain is spelled correctly",
                "The site may no longer exist",
                "Try again in a few minutes",
            ],
            FetchError::ConnectionRefused { .. } => &[
                "The site may be down or blocking requests",
                "Verify the port in the URL, if any",
                "Try again later",
            ],
            FetchError::ConnectionTimeout { .. } => &[
                "The site may be slow or unreachable",
                "Try again later",
                "Check that the URL is correct",
            ],
            FetchError::ConnectionReset { .. } => &[
                "Try the request again",
                "The site may be rejecting automated traffic",
            ],
            FetchError::SslCertExpired { .. } => &[
                "The site operator must renew its certificate",
                "Try again once the certificate has been replaced",
            ],
            FetchError::UnsupportedContent { .. } => &[
                "Use the resource endpoint for non-HTML content",
                "Check that the URL points to a web page",
            ],
            FetchError::OversizedContent { .. } => &[
                "Fetch a smaller resource",
                "Large downloads are not supported through the proxy",
            ],
            FetchError::Network { .. } => &[
                "Check your network connection",
                "Try again in a few minutes",
            ],
        }
    }

    /// Classifies a transport error from the HTTP client.
    ///
    /// Timeouts are recognized directly; everything else is classified by
    /// walking the error's source chain, preferring `io::Error` kinds over
    /// message text.
    pub fn from_transport(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::ConnectionTimeout {
                url: url.to_string(),
            };
        }

        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
        while let Some(current) = source {
            if let Some(io_err) = current.downcast_ref::<std::io::Error>() {
                match io_err.kind() {
                    std::io::ErrorKind::ConnectionRefused => {
                        return FetchError::ConnectionRefused {
                            url: url.to_string(),
                        }
                    }
                    std::io::ErrorKind::ConnectionReset => {
                        return FetchError::ConnectionReset {
                            url: url.to_string(),
                        }
                    }
                    std::io::ErrorKind::TimedOut => {
                        return FetchError::ConnectionTimeout {
                            url: url.to_string(),
                        }
                    }
                    _ => {}
                }
            }
            source = current.source();
        }

        Self::from_chain_text(url, &source_chain_text(err))
    }

    /// Classifies a failure from the flattened source-chain text.
    ///
    /// Pure function over the message so the mapping is testable without a
    /// live network.
    pub fn from_chain_text(url: &str, text: &str) -> Self {
        let text_lower = text.to_ascii_lowercase();
        let url = url.to_string();

        if text_lower.contains("dns error")
            || text_lower.contains("failed to lookup address")
            || text_lower.contains("name or service not known")
            || text_lower.contains("no such host")
        {
            FetchError::DnsLookupFailed { url }
        } else if text_lower.contains("connection refused") {
            FetchError::ConnectionRefused { url }
        } else if text_lower.contains("connection reset") || text_lower.contains("reset by peer") {
            FetchError::ConnectionReset { url }
        } else if text_lower.contains("timed out") || text_lower.contains("timeout") {
            FetchError::ConnectionTimeout { url }
        } else if text_lower.contains("certificate") && text_lower.contains("expired") {
            FetchError::SslCertExpired { url }
        } else {
            FetchError::Network {
                url,
                message: text.to_string(),
            }
        }
    }
}

/// Flattens an error and all its sources into a single string.
fn source_chain_text(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(current) = source {
        parts.push(current.to_string());
        source = current.source();
    }
    parts.join(": ")
}

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        let url = "https://example.com/".to_string();
        assert_eq!(FetchError::InvalidUrl { url: url.clone() }.status(), 400);
        assert_eq!(FetchError::DnsLookupFailed { url: url.clone() }.status(), 502);
        assert_eq!(FetchError::ConnectionRefused { url: url.clone() }.status(), 502);
        assert_eq!(FetchError::ConnectionTimeout { url: url.clone() }.status(), 502);
        assert_eq!(FetchError::ConnectionReset { url: url.clone() }.status(), 502);
        assert_eq!(FetchError::SslCertExpired { url }.status(), 502);
        assert_eq!(
            FetchError::UnsupportedContent {
                content_type: "image/png".into()
            }
            .status(),
            415
        );
        assert_eq!(FetchError::OversizedContent { limit: 10 }.status(), 415);
    }

    #[test]
    fn oversized_shares_the_unsupported_code() {
        assert_eq!(
            FetchError::OversizedContent { limit: 10 }.code(),
            "UNSUPPORTED_CONTENT"
        );
        assert_eq!(
            FetchError::UnsupportedContent {
                content_type: "image/png".into()
            }
            .code(),
            "UNSUPPORTED_CONTENT"
        );
    }

    #[test]
    fn chain_text_classifies_dns_failures() {
        let err = FetchError::from_chain_text(
            "https://gone.example/",
            "error sending request: dns error: failed to lookup address information",
        );
        assert!(matches!(err, FetchError::DnsLookupFailed { .. }));
        assert_eq!(err.code(), "DNS_LOOKUP_FAILED");
    }

    #[test]
    fn chain_text_classifies_refused_and_reset() {
        assert!(matches!(
            FetchError::from_chain_text("http://x/", "tcp connect error: Connection refused (os error 111)"),
            FetchError::ConnectionRefused { .. }
        ));
        assert!(matches!(
            FetchError::from_chain_text("http://x/", "connection reset by peer"),
            FetchError::ConnectionReset { .. }
        ));
    }

    #[test]
    fn chain_text_classifies_tls_expiry() {
        assert!(matches!(
            FetchError::from_chain_text("https://x/", "invalid peer certificate: certificate has expired"),
            FetchError::SslCertExpired { .. }
        ));
    }

    #[test]
    fn chain_text_falls_back_to_network_error() {
        let err = FetchError::from_chain_text("http://x/", "something novel went wrong");
        assert!(matches!(err, FetchError::Network { .. }));
        assert_eq!(err.code(), "NETWORK_ERROR");
        assert_eq!(err.status(), 502);
    }

    #[test]
    fn every_kind_has_suggestions() {
        let errors = [
            FetchError::InvalidUrl { url: "x".into() },
            FetchError::DnsLookupFailed { url: "x".into() },
            FetchError::ConnectionRefused { url: "x".into() },
            FetchError::ConnectionTimeout { url: "x".into() },
            FetchError::ConnectionReset { url: "x".into() },
            FetchError::SslCertExpired { url: "x".into() },
            FetchError::UnsupportedContent {
                content_type: "x".into(),
            },
            FetchError::OversizedContent { limit: 1 },
            FetchError::Network {
                url: "x".into(),
                message: "x".into(),
            },
        ];
        for err in errors {
            assert!(!err.suggestions().is_empty(), "{} has no suggestions", err.code());
            assert!(!err.explanation().is_empty());
        }
    }
}
