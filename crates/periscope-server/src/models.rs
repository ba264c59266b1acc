//! API request and response models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Request body for POST /encode.
#[derive(Debug, Deserialize)]
pub struct EncodeRequest {
    /// The URL to encode.
    #[serde(default)]
    pub url: Option<String>,
}

/// Response body for POST /encode.
#[derive(Debug, Serialize)]
pub struct EncodeResponse {
    pub original: String,
    pub encoded: String,
}

/// Request body for POST /decode.
#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    /// The token to decode.
    #[serde(default)]
    pub encoded: Option<String>,
}

/// Response body for POST /decode.
#[derive(Debug, Serialize)]
pub struct DecodeResponse {
    pub encoded: String,
    pub decoded: String,
}

/// Parameters for GET/POST /proxy.
#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    /// The target URL, raw or encoded.
    #[serde(default)]
    pub url: Option<String>,
    /// When true, `url` carries an encoded reference.
    #[serde(default)]
    pub encoded: bool,
}

/// Metadata block of a successful proxy envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyMetadata {
    /// Final URL after redirect resolution.
    pub url: String,
    /// Hostname of the final URL.
    pub domain: String,
    /// Upstream HTTP status.
    pub status_code: u16,
    /// Upstream content type.
    pub content_type: String,
    /// Body length in bytes, before rewriting.
    pub content_length: u64,
    /// Wall-clock fetch latency in milliseconds.
    pub fetch_time_ms: u64,
}

/// Success envelope for GET/POST /proxy.
#[derive(Debug, Serialize)]
pub struct ProxyEnvelope {
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub metadata: ProxyMetadata,
    /// Upstream response headers minus the stripped set.
    pub headers: BTreeMap<String, String>,
    /// The rewritten document.
    pub content: String,
}

/// Query parameters for GET /resource.
#[derive(Debug, Deserialize)]
pub struct ResourceParams {
    /// The target resource URL, raw or encoded.
    #[serde(default)]
    pub url: Option<String>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
