//! CSS reference rewriting.
//!
//! Rewrites `url(...)` occurrences and bare-string `@import` rules so
//! stylesheet-internal references route through the proxy. Used both as a
//! content-wide pass over HTML documents (covering `<style>` blocks and
//! `style=` attributes) and by the resource relay for standalone
//! stylesheets, where references resolve against the stylesheet's own URL.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::rewrite::RewriteContext;

static CSS_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^"'()\s]+))\s*\)"#)
        .expect("Invalid css url regex")
});

static CSS_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]+)"|'([^']+)')"#).expect("Invalid css import regex")
});

/// Rewrites every `url(...)` and `@import "..."` occurrence in `content`.
///
/// Unresolvable references are preserved byte-for-byte. The `@import
/// url(...)` form is covered by the `url(...)` pass.
pub fn rewrite_css(content: &str, ctx: &RewriteContext) -> String {
    let out = CSS_URL_RE
        .replace_all(content, |caps: &Captures| {
            let (value, quote) = if let Some(m) = caps.get(1) {
                (m.as_str(), "\"")
            } else if let Some(m) = caps.get(2) {
                (m.as_str(), "'")
            } else {
                (&caps[3], "")
            };
            match ctx.resolve(value) {
                Some(rewritten) => format!("url({quote}{rewritten}{quote})"),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    CSS_IMPORT_RE
        .replace_all(&out, |caps: &Captures| {
            let (value, quote) = match caps.get(1) {
                Some(m) => (m.as_str(), '"'),
                None => (&caps[2], '\''),
            };
            match ctx.resolve(value) {
                Some(rewritten) => format!("@import {quote}{rewritten}{quote}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx_for(base: &str) -> RewriteContext {
        RewriteContext::new(Url::parse(base).unwrap(), "http://127.0.0.1:48080")
    }

    fn resource_url(target: &str) -> String {
        format!(
            "http://127.0.0.1:48080/resource?url={}",
            urlencoding::encode(target)
        )
    }

    #[test]
    fn rewrites_relative_import_against_stylesheet_url() {
        let css = r#"@import "./b.css";"#;
        let out = rewrite_css(css, &ctx_for("https://example.com/style.css"));
        assert_eq!(
            out,
            format!(r#"@import "{}";"#, resource_url("https://example.com/b.css"))
        );
    }

    #[test]
    fn rewrites_url_functions_in_all_quote_styles() {
        let ctx = ctx_for("https://example.com/css/main.css");
        let css = r#"a{background:url(bg.png)}b{background:url('x.png')}c{background:url("y.png")}"#;
        let out = rewrite_css(css, &ctx);

        assert!(out.contains(&format!("url({})", resource_url("https://example.com/css/bg.png"))));
        assert!(out.contains(&format!("url('{}')", resource_url("https://example.com/css/x.png"))));
        assert!(out.contains(&format!(
            "url(\"{}\")",
            resource_url("https://example.com/css/y.png")
        )));
    }

    #[test]
    fn rewrites_import_url_form_once() {
        let ctx = ctx_for("https://example.com/style.css");
        let out = rewrite_css(r#"@import url("extra.css");"#, &ctx);
        assert_eq!(
            out,
            format!(
                r#"@import url("{}");"#,
                resource_url("https://example.com/extra.css")
            )
        );
    }

    #[test]
    fn data_uris_in_css_are_untouched() {
        let css = r#"a{background:url(data:image/gif;base64,R0lGOD)}"#;
        let out = rewrite_css(css, &ctx_for("https://example.com/style.css"));
        assert_eq!(out, css);
    }

    #[test]
    fn rewriting_is_idempotent() {
        let ctx = ctx_for("https://example.com/style.css");
        let once = rewrite_css("a{background:url(/bg.png)}", &ctx);
        let twice = rewrite_css(&once, &ctx);
        assert_eq!(once, twice);
    }
}
