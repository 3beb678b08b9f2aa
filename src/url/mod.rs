//! URL handling for Karasu
//!
//! This module provides URL validation, relative resolution, dedup-key
//! normalization, and link sanitization. Every URL that enters the crawl
//! frontier passes through here first.

mod normalize;
mod sanitize;

pub use normalize::{normalize_key, resolve_relative, validate_absolute};
pub use sanitize::sanitize_links;

use url::Url;

/// Returns the lowercase host of a URL, if it has one
///
/// Used for same-domain scoping: hosts are compared case-insensitively
/// and exactly (no subdomain folding).
pub fn host_of(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
