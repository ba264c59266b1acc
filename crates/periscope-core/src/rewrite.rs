//! HTML rewriting.
//!
//! Rewrites every resource reference in a fetched document so it routes
//! back through the proxy's resource endpoint. The passes are regex-based
//! and ordered so that no pass re-encodes another pass's output: attribute
//! and srcset values first, then CSS `url(...)` occurrences, then the
//! `<base>` safety net and the runtime shim are injected so neither is
//! visible to the earlier passes.
//!
//! Rewriting is best-effort throughout. A value that cannot be resolved is
//! preserved byte-for-byte, and malformed markup is never an error.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

use crate::css;
use crate::shim;

/// URL schemes that can never be proxied and are always left untouched.
pub const UNPROXYABLE_SCHEMES: &[&str] = &["data:", "javascript:", "mailto:", "tel:", "blob:"];

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\s)(src|href|action|poster)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid attribute regex")
});

static SRCSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\s)srcset\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("Invalid srcset regex")
});

static INTEGRITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+integrity\s*=\s*(?:"[^"]*"|'[^']*')"#).expect("Invalid integrity regex")
});

/// Resolution context for one rewritten response.
///
/// Pairs the document's final (post-redirect) URL with the proxy's own
/// base URL. Scoped to a single response and never shared across requests.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    base: Url,
    proxy_base: String,
    resource_prefix: String,
}

impl RewriteContext {
    /// Creates a context from the rewrite base and the proxy base URL.
    pub fn new(base: Url, proxy_base: &str) -> Self {
        let proxy_base = proxy_base.trim_end_matches('/').to_string();
        let resource_prefix = format!("{proxy_base}/resource?url=");
        Self {
            base,
            proxy_base,
            resource_prefix,
        }
    }

    /// The document URL every relative reference resolves against.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// The resource-endpoint prefix rewritten URLs point at.
    pub fn resource_prefix(&self) -> &str {
        &self.resource_prefix
    }

    /// Builds the proxied form of an already-absolute URL.
    pub fn proxied(&self, absolute: &str) -> String {
        format!("{}{}", self.resource_prefix, urlencoding::encode(absolute))
    }

    /// Resolves a reference value to its proxied form.
    ///
    /// Returns `None` when the value must be left untouched: empty values,
    /// fragments, unproxyable schemes, values already routed through the
    /// proxy, and values that fail to resolve to an absolute URL.
    pub fn resolve(&self, value: &str) -> Option<String> {
        let value = value.trim();
        if value.is_empty() || value.starts_with('#') {
            return None;
        }

        let lower = value.to_ascii_lowercase();
        if UNPROXYABLE_SCHEMES
            .iter()
            .any(|scheme| lower.starts_with(scheme))
        {
            return None;
        }

        // Double-rewrite guard.
        if value.starts_with(&self.proxy_base) {
            return None;
        }

        let absolute = if let Some(rest) = value.strip_prefix("//") {
            // Protocol-relative references default to https.
            Url::parse(&format!("https://{rest}")).ok()?
        } else {
            self.base.join(value).ok()?
        };

        Some(self.proxied(absolute.as_str()))
    }
}

/// Rewrites a fetched HTML document for serving through the proxy.
pub fn rewrite_html(html: &str, ctx: &RewriteContext) -> String {
    let mut out = rewrite_attributes(html, ctx);
    out = rewrite_srcset(&out, ctx);
    out = css::rewrite_css(&out, ctx);
    out = strip_integrity(&out);
    out = insert_base_tag(&out, ctx);
    inject_shim(&out, ctx)
}

/// Rewrites `src`, `href`, `action`, and `poster` attribute values.
fn rewrite_attributes(html: &str, ctx: &RewriteContext) -> String {
    ATTR_RE
        .replace_all(html, |caps: &Captures| {
            let ws = &caps[1];
            let attr = &caps[2];
            let (value, quote) = match caps.get(3) {
                Some(m) => (m.as_str(), '"'),
                None => (&caps[4], '\''),
            };
            match ctx.resolve(value) {
                Some(rewritten) => format!("{ws}{attr}={quote}{rewritten}{quote}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Rewrites `srcset` attributes, keeping width/density descriptors intact.
fn rewrite_srcset(html: &str, ctx: &RewriteContext) -> String {
    SRCSET_RE
        .replace_all(html, |caps: &Captures| {
            let ws = &caps[1];
            let (value, quote) = match caps.get(2) {
                Some(m) => (m.as_str(), '"'),
                None => (&caps[3], '\''),
            };
            let rewritten = rewrite_srcset_value(value, ctx);
            format!("{ws}srcset={quote}{rewritten}{quote}")
        })
        .into_owned()
}

fn rewrite_srcset_value(value: &str, ctx: &RewriteContext) -> String {
    value
        .split(',')
        .map(|candidate| {
            let candidate = candidate.trim();
            if candidate.is_empty() {
                return String::new();
            }
            let mut parts = candidate.splitn(2, char::is_whitespace);
            let url_token = parts.next().unwrap_or(candidate);
            let descriptor = parts.next().map(str::trim).unwrap_or("");
            let rewritten = ctx
                .resolve(url_token)
                .unwrap_or_else(|| url_token.to_string());
            if descriptor.is_empty() {
                rewritten
            } else {
                format!("{rewritten} {descriptor}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Removes subresource-integrity attributes.
///
/// Rewritten sub-resources no longer match their original hashes, so a
/// surviving `integrity` attribute would make the browser refuse them.
fn strip_integrity(html: &str) -> String {
    INTEGRITY_RE.replace_all(html, "").into_owned()
}

/// Inserts a `<base href>` safety net immediately after the `<head>` tag.
///
/// Covers any reference the rewrite passes miss. Prepends to the document
/// when no `<head>` exists.
fn insert_base_tag(html: &str, ctx: &RewriteContext) -> String {
    let tag = format!(r#"<base href="{}">"#, ctx.base());
    match head_insert_position(html) {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{tag}{html}"),
    }
}

/// Injects the client runtime shim immediately after the `<head>` tag.
fn inject_shim(html: &str, ctx: &RewriteContext) -> String {
    let script = shim::runtime_shim(ctx.base(), ctx.resource_prefix());
    match head_insert_position(html) {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..pos]);
            out.push_str(&script);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{script}{html}"),
    }
}

/// Finds the index just past the opening `<head ...>` tag, if any.
fn head_insert_position(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(found) = lower[from..].find("<head") {
        let start = from + found;
        // Reject `<header>` and friends.
        match lower.as_bytes().get(start + 5) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'/') => {
                return lower[start..].find('>').map(|close| start + close + 1);
            }
            _ => from = start + 5,
        }
    }
    None
}
