//! Periscope Core - fetch and rewrite pipeline.
//!
//! This crate implements the proxy's self-contained pipeline: validate a
//! client-supplied target URL, fetch it server-side, and rewrite the
//! returned HTML/CSS so every embedded reference keeps flowing through the
//! proxy.
//!
//! ## Architecture
//!
//! ```text
//! client URL → codec (decode/validate) → fetch
//!                                          │
//!                            ┌─────────────┴─────────────┐
//!                            │ failure                   │ success
//!                            ▼                           ▼
//!                     error (classify)         rewrite (HTML documents)
//!                                              relay   (sub-resources)
//! ```
//!
//! Requests are independent: the only shared state is the pooled HTTP
//! client inside [`Fetcher`], and nothing is cached or retried.

pub mod codec;
pub mod css;
pub mod error;
pub mod fetch;
pub mod relay;
pub mod rewrite;
pub mod shim;

pub use codec::DecodeError;
pub use error::{FetchError, Result};
pub use fetch::{FetchConfig, FetchedResponse, Fetcher, DEFAULT_MAX_BODY_BYTES, DEFAULT_TIMEOUT};
pub use relay::{relay_response, RelayedResource, STRIPPED_HEADERS};
pub use rewrite::{rewrite_html, RewriteContext};
