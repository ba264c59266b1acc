//! API route handlers.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use tracing::{debug, info};

use periscope_core::rewrite::RewriteContext;
use periscope_core::{codec, relay, rewrite, FetchError};

use crate::error::{ApiError, Result};
use crate::models::{
    DecodeRequest, DecodeResponse, EncodeRequest, EncodeResponse, HealthResponse, ProxyEnvelope,
    ProxyMetadata, ProxyParams, ResourceParams,
};
use crate::state::AppState;

/// POST /encode - Encode a target URL for transport.
pub async fn encode_url(Json(req): Json<EncodeRequest>) -> Result<Json<EncodeResponse>> {
    let url = req
        .url
        .ok_or_else(|| ApiError::BadRequest("missing required field: url".to_string()))?;

    let encoded = codec::encode(&url);
    Ok(Json(EncodeResponse {
        original: url,
        encoded,
    }))
}

/// POST /decode - Decode a transport token back into a URL.
pub async fn decode_token(Json(req): Json<DecodeRequest>) -> Result<Json<DecodeResponse>> {
    let encoded = req
        .encoded
        .ok_or_else(|| ApiError::BadRequest("missing required field: encoded".to_string()))?;

    let decoded = codec::decode(&encoded).map_err(|err| ApiError::BadRequest(err.to_string()))?;
    Ok(Json(DecodeResponse { encoded, decoded }))
}

/// GET /proxy - Fetch and rewrite a document.
pub async fn proxy_get(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
    headers: HeaderMap,
) -> Result<Json<ProxyEnvelope>> {
    proxy_document(state, params, headers).await
}

/// POST /proxy - Fetch and rewrite a document.
pub async fn proxy_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<ProxyParams>,
) -> Result<Json<ProxyEnvelope>> {
    proxy_document(state, params, headers).await
}

async fn proxy_document(
    state: AppState,
    params: ProxyParams,
    headers: HeaderMap,
) -> Result<Json<ProxyEnvelope>> {
    let raw = params
        .url
        .ok_or_else(|| ApiError::BadRequest("missing required parameter: url".to_string()))?;

    let target = if params.encoded {
        codec::decode(&raw).map_err(|err| ApiError::BadRequest(err.to_string()))?
    } else {
        raw
    };

    if !codec::validate(&target) {
        return Err(ApiError::Fetch(FetchError::InvalidUrl { url: target }));
    }

    debug!(url = %target, "Proxying document");

    // The envelope carries readable text, so the upstream body must arrive
    // unencoded: Accept-Encoding is not forwarded on this path.
    let mut forwarded = headers.clone();
    forwarded.remove(header::ACCEPT_ENCODING);

    let fetched = state.fetcher.fetch(&target, &forwarded).await?;

    if !fetched.is_html() {
        return Err(ApiError::Fetch(FetchError::UnsupportedContent {
            content_type: fetched.content_type,
        }));
    }

    let ctx = RewriteContext::new(fetched.final_url.clone(), state.public_url());
    let content = rewrite::rewrite_html(&fetched.text(), &ctx);

    info!(
        url = %fetched.final_url,
        status = fetched.status,
        bytes = fetched.body.len(),
        fetch_time_ms = fetched.elapsed.as_millis() as u64,
        "Document proxied"
    );

    Ok(Json(ProxyEnvelope {
        success: true,
        kind: "content".to_string(),
        metadata: ProxyMetadata {
            url: fetched.final_url.to_string(),
            domain: codec::extract_domain(fetched.final_url.as_str()),
            status_code: fetched.status,
            content_type: fetched.content_type.clone(),
            content_length: fetched.body.len() as u64,
            fetch_time_ms: fetched.elapsed.as_millis() as u64,
        },
        headers: envelope_headers(&fetched.headers),
        content,
    }))
}

/// GET /resource - Relay a sub-resource with rewritten internal references.
pub async fn resource(
    State(state): State<AppState>,
    Query(params): Query<ResourceParams>,
    headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap, Vec<u8>)> {
    let raw = params
        .url
        .ok_or_else(|| ApiError::BadRequest("missing required parameter: url".to_string()))?;

    let target = resolve_resource_target(&raw)?;
    debug!(url = %target, "Relaying resource");

    let fetched = state.fetcher.fetch(&target, &headers).await?;
    let ctx = RewriteContext::new(fetched.final_url.clone(), state.public_url());
    let relayed = relay::relay_response(fetched, &ctx);

    let status = StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::OK);
    let mut response_headers = relayed.headers;
    if let Ok(value) = relayed.content_type.parse() {
        response_headers.insert(header::CONTENT_TYPE, value);
    }

    Ok((status, response_headers, relayed.body))
}

/// GET /health - Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Accepts a raw target URL or an encoded token.
///
/// Relay callers are generated URLs, so auto-detect: a value that fails
/// validation as-is gets one decode attempt before rejection.
fn resolve_resource_target(raw: &str) -> Result<String> {
    if codec::validate(raw) {
        return Ok(raw.to_string());
    }
    if let Ok(decoded) = codec::decode(raw) {
        if codec::validate(&decoded) {
            return Ok(decoded);
        }
    }
    Err(ApiError::Fetch(FetchError::InvalidUrl {
        url: raw.to_string(),
    }))
}

/// Upstream headers surfaced in the proxy envelope, minus the stripped set.
fn envelope_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| !relay::STRIPPED_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_target_accepts_raw_urls() {
        let target = resolve_resource_target("https://example.com/a.png").unwrap();
        assert_eq!(target, "https://example.com/a.png");
    }

    #[test]
    fn resource_target_falls_back_to_decoding() {
        let token = codec::encode("https://example.com/a.png");
        let target = resolve_resource_target(&token).unwrap();
        assert_eq!(target, "https://example.com/a.png");
    }

    #[test]
    fn resource_target_rejects_disallowed_urls() {
        let err = resolve_resource_target("http://localhost/").unwrap_err();
        assert!(matches!(
            err,
            ApiError::Fetch(FetchError::InvalidUrl { .. })
        ));

        // A token that decodes to a disallowed URL is also rejected.
        let token = codec::encode("http://127.0.0.1/");
        assert!(resolve_resource_target(&token).is_err());
    }

    #[test]
    fn envelope_headers_drop_the_stripped_set() {
        let mut headers = HeaderMap::new();
        headers.insert("content-security-policy", "default-src 'none'".parse().unwrap());
        headers.insert("x-frame-options", "DENY".parse().unwrap());
        headers.insert("server", "upstream/1.0".parse().unwrap());

        let map = envelope_headers(&headers);
        assert!(!map.contains_key("content-security-policy"));
        assert!(!map.contains_key("x-frame-options"));
        assert_eq!(map.get("server").map(String::as_str), Some("upstream/1.0"));
    }
}
