//! URL validation and dedup-key normalization

use crate::UrlError;
use url::Url;

/// Scheme fragments that must not appear anywhere in a candidate URL
///
/// Checked as substrings of the whole input (case-insensitive), not just
/// the parsed scheme, so `https://x/redirect?to=javascript:...` is caught
/// before it can smuggle a payload through a later resolution step.
const DISALLOWED_SCHEMES: &[&str] = &["javascript:", "data:", "file:", "vbscript:", "about:"];

/// Validates a string as an absolute, crawlable HTTP(S) URL
///
/// # Validation Rules
///
/// 1. No disallowed scheme fragment may appear anywhere in the input
/// 2. The string must parse as an absolute URL
/// 3. The scheme must be `http` or `https`
/// 4. The URL must have a host
///
/// # Arguments
///
/// * `input` - The candidate URL string
///
/// # Returns
///
/// * `Ok(Url)` - The parsed, validated URL
/// * `Err(UrlError)` - The input failed one of the rules
///
/// # Examples
///
/// ```
/// use karasu::url::validate_absolute;
///
/// assert!(validate_absolute("https://example.com/page").is_ok());
/// assert!(validate_absolute("javascript:alert(1)").is_err());
/// assert!(validate_absolute("/relative/path").is_err());
/// ```
pub fn validate_absolute(input: &str) -> Result<Url, UrlError> {
    let lowered = input.to_lowercase();
    for scheme in DISALLOWED_SCHEMES {
        if lowered.contains(scheme) {
            return Err(UrlError::DisallowedScheme(input.to_string()));
        }
    }

    let url = Url::parse(input).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Resolves a (possibly relative) href against a base URL
///
/// Standard relative resolution via [`Url::join`]; the resolved result must
/// itself pass [`validate_absolute`], so hrefs that resolve to disallowed
/// schemes or non-HTTP URLs are rejected.
///
/// # Arguments
///
/// * `href` - The href value, absolute or relative
/// * `base` - The URL of the page the href was found on
pub fn resolve_relative(href: &str, base: &Url) -> Result<Url, UrlError> {
    let resolved = base.join(href).map_err(|e| UrlError::Parse(e.to_string()))?;
    validate_absolute(resolved.as_str())
}

/// Produces the canonical dedup key for a URL
///
/// The key is `scheme://host[:port]` plus the path with any trailing slash
/// stripped (unless the path is exactly `/`). The host is lowercased, path
/// case is preserved, and the query and fragment are dropped. Two URLs that
/// differ only in trailing slash, fragment, or query map to the same key;
/// the query stays on the URL actually fetched.
///
/// # Examples
///
/// ```
/// use karasu::url::{normalize_key, validate_absolute};
///
/// let a = validate_absolute("https://Example.com/Page/").unwrap();
/// let b = validate_absolute("https://example.com/Page?q=1#top").unwrap();
/// assert_eq!(normalize_key(&a), normalize_key(&b));
/// assert_eq!(normalize_key(&a), "https://example.com/Page");
/// ```
pub fn normalize_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();

    let path = url.path();
    let path = if path.len() > 1 && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    };

    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, path),
        None => format!("{}://{}{}", url.scheme(), host, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_http_and_https() {
        assert!(validate_absolute("http://example.com/").is_ok());
        assert!(validate_absolute("https://example.com/").is_ok());
    }

    #[test]
    fn test_validate_rejects_other_schemes() {
        let result = validate_absolute("ftp://example.com/");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_validate_rejects_relative() {
        assert!(validate_absolute("/page").is_err());
        assert!(validate_absolute("page.html").is_err());
    }

    #[test]
    fn test_validate_rejects_disallowed_schemes() {
        for input in [
            "javascript:alert(1)",
            "JAVASCRIPT:alert(1)",
            "data:text/html,<h1>x</h1>",
            "file:///etc/passwd",
            "vbscript:msgbox(1)",
            "about:blank",
        ] {
            let result = validate_absolute(input);
            assert!(
                matches!(result, Err(UrlError::DisallowedScheme(_))),
                "expected {} to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_validate_rejects_embedded_disallowed_scheme() {
        // The fragment appears mid-string, not as the parsed scheme
        let result = validate_absolute("https://example.com/?next=javascript:alert(1)");
        assert!(matches!(result, Err(UrlError::DisallowedScheme(_))));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = Url::parse("https://example.com/dir/page").unwrap();
        let resolved = resolve_relative("/other", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/other");
    }

    #[test]
    fn test_resolve_relative_sibling() {
        let base = Url::parse("https://example.com/dir/page").unwrap();
        let resolved = resolve_relative("sibling", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/dir/sibling");
    }

    #[test]
    fn test_resolve_absolute_href() {
        let base = Url::parse("https://example.com/").unwrap();
        let resolved = resolve_relative("https://other.com/page", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://other.com/page");
    }

    #[test]
    fn test_resolve_rejects_mailto() {
        let base = Url::parse("https://example.com/").unwrap();
        assert!(resolve_relative("mailto:x@y.com", &base).is_err());
    }

    #[test]
    fn test_normalize_key_strips_trailing_slash() {
        let url = Url::parse("https://example.com/page/").unwrap();
        assert_eq!(normalize_key(&url), "https://example.com/page");
    }

    #[test]
    fn test_normalize_key_keeps_root_slash() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(normalize_key(&url), "https://example.com/");
    }

    #[test]
    fn test_normalize_key_drops_query_and_fragment() {
        let url = Url::parse("https://example.com/page?b=2&a=1#section").unwrap();
        assert_eq!(normalize_key(&url), "https://example.com/page");
    }

    #[test]
    fn test_normalize_key_lowercases_host_only() {
        let url = Url::parse("https://EXAMPLE.com/CasedPath").unwrap();
        assert_eq!(normalize_key(&url), "https://example.com/CasedPath");
    }

    #[test]
    fn test_normalize_key_preserves_port() {
        let url = Url::parse("http://127.0.0.1:8080/page").unwrap();
        assert_eq!(normalize_key(&url), "http://127.0.0.1:8080/page");
    }

    #[test]
    fn test_normalize_key_round_trips() {
        // The key of a validated URL is itself a valid URL with the same key
        for input in [
            "https://example.com/a/b/",
            "https://Example.com/a?q=1#frag",
            "http://example.com",
        ] {
            let url = validate_absolute(input).unwrap();
            let key = normalize_key(&url);
            let reparsed = validate_absolute(&key).unwrap();
            assert_eq!(normalize_key(&reparsed), key);
        }
    }
}
