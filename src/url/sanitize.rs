//! Link sanitization for extracted href lists

use crate::url::{normalize_key, resolve_relative};
use std::collections::HashSet;
use url::Url;

/// Sanitizes a list of raw hrefs extracted from a page
///
/// # Rules
///
/// - Relative hrefs are resolved against `base`
/// - Hrefs that fail validation (malicious schemes, non-HTTP, unparseable)
///   are dropped silently
/// - Fragment-only and empty hrefs are dropped
/// - Duplicates are removed by normalized key; the first-seen absolute form
///   is the one kept
/// - Document order of first occurrence is preserved
///
/// # Arguments
///
/// * `hrefs` - Raw href values in document order
/// * `base` - The URL of the page they were extracted from
///
/// # Returns
///
/// Deduplicated absolute URLs, in document order
pub fn sanitize_links(hrefs: &[String], base: &Url) -> Vec<Url> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();

    for href in hrefs {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        let resolved = match resolve_relative(href, base) {
            Ok(url) => url,
            Err(_) => continue,
        };

        if seen.insert(normalize_key(&resolved)) {
            links.push(resolved);
        }
    }

    links
}
