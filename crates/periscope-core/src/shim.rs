//! Client runtime shim.
//!
//! Static rewriting cannot cover URLs the page's own script constructs
//! after load. The shim closes that gap: a self-contained `<script>` block
//! generated per response with the document base URL and the proxy's
//! resource-endpoint prefix baked in as literals, so the server keeps no
//! rewrite state between requests. At document-load time it wraps
//! `window.fetch` and `XMLHttpRequest.prototype.open`, patches the URL
//! property setters on the element prototypes that carry resources, and
//! wraps `Element.prototype.setAttribute`, each with a guard against
//! double-rewriting values that already point at the proxy.

use url::Url;

/// Marker attribute identifying the injected shim script.
pub const SHIM_MARKER: &str = r#"data-periscope="shim""#;

const SHIM_TEMPLATE: &str = r##"<script data-periscope="shim">
(function () {
  var BASE = "{{BASE_URL}}";
  var PREFIX = "{{RESOURCE_PREFIX}}";
  function reroute(value) {
    if (!value || typeof value !== "string") return value;
    if (value.indexOf(PREFIX) !== -1) return value;
    var lower = value.toLowerCase();
    if (lower.indexOf("data:") === 0 || lower.indexOf("javascript:") === 0 ||
        lower.indexOf("mailto:") === 0 || lower.indexOf("tel:") === 0 ||
        lower.indexOf("blob:") === 0 || value.charAt(0) === "#") {
      return value;
    }
    try {
      var absolute = new URL(value, BASE).href;
      return PREFIX + encodeURIComponent(absolute);
    } catch (e) {
      return value;
    }
  }
  var nativeFetch = window.fetch;
  window.fetch = function (input, init) {
    if (typeof input === "string") {
      return nativeFetch.call(window, reroute(input), init);
    }
    if (input && typeof input.url === "string") {
      return nativeFetch.call(window, new Request(reroute(input.url), input), init);
    }
    return nativeFetch.call(window, input, init);
  };
  var nativeOpen = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function (method, url) {
    var args = Array.prototype.slice.call(arguments);
    if (typeof url === "string") args[1] = reroute(url);
    return nativeOpen.apply(this, args);
  };
  function patchUrlProperty(proto, name) {
    var descriptor = Object.getOwnPropertyDescriptor(proto, name);
    if (!descriptor || !descriptor.set) return;
    Object.defineProperty(proto, name, {
      get: descriptor.get,
      set: function (value) { descriptor.set.call(this, reroute(value)); },
      configurable: true
    });
  }
  patchUrlProperty(HTMLImageElement.prototype, "src");
  patchUrlProperty(HTMLScriptElement.prototype, "src");
  patchUrlProperty(HTMLLinkElement.prototype, "href");
  patchUrlProperty(HTMLAnchorElement.prototype, "href");
  patchUrlProperty(HTMLMediaElement.prototype, "src");
  var nativeSetAttribute = Element.prototype.setAttribute;
  Element.prototype.setAttribute = function (name, value) {
    if ((name === "src" || name === "href" || name === "action") && typeof value === "string") {
      value = reroute(value);
    }
    return nativeSetAttribute.call(this, name, value);
  };
})();
</script>"##;

/// Renders the shim for one response.
///
/// `base` is the document's final URL; `resource_prefix` is the proxy's
/// resource-endpoint prefix including the `url=` query key.
pub fn runtime_shim(base: &Url, resource_prefix: &str) -> String {
    SHIM_TEMPLATE
        .replace("{{BASE_URL}}", base.as_str())
        .replace("{{RESOURCE_PREFIX}}", resource_prefix)
}
