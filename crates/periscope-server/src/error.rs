//! API error types.
//!
//! Every failure leaving the server is a stable-shaped envelope:
//! `{success: false, error: {code, message, timestamp, details?}}`.
//! Classified fetch errors carry their own status and code; request-shape
//! problems map to 400 `BAD_REQUEST`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use periscope_core::FetchError;
use serde::Serialize;
use thiserror::Error;

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is malformed (missing or undecodable fields).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A classified failure from the fetch pipeline.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Error envelope body.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

/// The `error` object inside the envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Structured remediation detail for classified failures.
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub explanation: String,
    pub suggestions: Vec<String>,
}

impl ApiError {
    /// HTTP status for the failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Fetch(err) => {
                StatusCode::from_u16(err.status()).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    /// Builds the serializable envelope for this failure.
    pub fn envelope(&self) -> ErrorEnvelope {
        let (code, details) = match self {
            ApiError::BadRequest(_) => ("BAD_REQUEST".to_string(), None),
            ApiError::Fetch(err) => (
                err.code().to_string(),
                Some(ErrorDetails {
                    explanation: err.explanation().to_string(),
                    suggestions: err
                        .suggestions()
                        .iter()
                        .map(|s| (*s).to_string())
                        .collect(),
                }),
            ),
        };

        ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code,
                message: self.to_string(),
                timestamp: Utc::now().to_rfc3339(),
                details,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), axum::Json(self.envelope())).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let err = ApiError::BadRequest("missing url".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let envelope = err.envelope();
        assert!(!envelope.success);
        assert_eq!(envelope.error.code, "BAD_REQUEST");
        assert!(envelope.error.details.is_none());
    }

    #[test]
    fn connection_refused_maps_to_502_envelope() {
        let err = ApiError::Fetch(FetchError::ConnectionRefused {
            url: "http://gone.example/".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let envelope = err.envelope();
        assert!(!envelope.success);
        assert_eq!(envelope.error.code, "CONNECTION_REFUSED");
        let details = envelope.error.details.expect("classified errors carry details");
        assert!(!details.suggestions.is_empty());
    }

    #[test]
    fn invalid_url_keeps_the_client_error_status() {
        let err = ApiError::Fetch(FetchError::InvalidUrl {
            url: "ftp://x".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.envelope().error.code, "INVALID_URL");
    }

    #[test]
    fn oversize_maps_to_415() {
        let err = ApiError::Fetch(FetchError::OversizedContent { limit: 1024 });
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.envelope().error.code, "UNSUPPORTED_CONTENT");
    }
}
