//! Resource relay.
//!
//! The lighter-weight sibling of the document path: sub-resources fetched
//! by rewritten pages are served directly, without the JSON envelope.
//! Stylesheets get their internal references rewritten against the
//! resource's own resolved URL, HTML sub-documents (iframe targets) go
//! through the full rewrite engine, and everything else streams through
//! unchanged.

use reqwest::header::HeaderMap;

use crate::css;
use crate::fetch::FetchedResponse;
use crate::rewrite::{self, RewriteContext};

/// Upstream headers dropped from relayed responses.
///
/// These would otherwise instruct the browser to refuse the embedding this
/// proxy exists to enable.
pub const STRIPPED_HEADERS: &[&str] = &[
    "x-frame-options",
    "content-security-policy",
    "x-content-type-options",
    "strict-transport-security",
];

/// Headers the serving layer recomputes itself.
///
/// The relayed body may differ in length from the upstream one, and the
/// content type is carried separately on [`RelayedResource`].
const RECOMPUTED_HEADERS: &[&str] = &[
    "content-length",
    "transfer-encoding",
    "connection",
    "content-type",
];

/// A sub-resource ready to serve.
#[derive(Debug)]
pub struct RelayedResource {
    /// Upstream HTTP status, mirrored.
    pub status: u16,
    /// Upstream content type, mirrored.
    pub content_type: String,
    /// Upstream headers minus [`STRIPPED_HEADERS`] and recomputed headers.
    pub headers: HeaderMap,
    /// Body, rewritten for CSS/HTML and untouched otherwise.
    pub body: Vec<u8>,
}

/// Converts a fetched response into a relayable resource.
///
/// `ctx` must be built with the resource's own final URL as rewrite base.
/// Bodies still carrying a content encoding are opaque and pass through
/// unmodified.
pub fn relay_response(fetched: FetchedResponse, ctx: &RewriteContext) -> RelayedResource {
    let mut headers = HeaderMap::new();
    for (name, value) in fetched.headers.iter() {
        let lower = name.as_str().to_ascii_lowercase();
        if STRIPPED_HEADERS.contains(&lower.as_str())
            || RECOMPUTED_HEADERS.contains(&lower.as_str())
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    let body = if fetched.is_content_encoded() {
        fetched.body
    } else if fetched.is_css() {
        css::rewrite_css(&fetched.text(), ctx).into_bytes()
    } else if fetched.is_html() {
        rewrite::rewrite_html(&fetched.text(), ctx).into_bytes()
    } else {
        // Scripts, plain text, images, fonts: relayed as-is.
        fetched.body
    };

    RelayedResource {
        status: fetched.status,
        content_type: fetched.content_type,
        headers,
        body,
    }
}
