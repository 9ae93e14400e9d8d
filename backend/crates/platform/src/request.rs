//! Request value lookup
//!
//! Header and query-string accessors used when resolving a session token.

use http::HeaderMap;

/// Extract a non-blank header value
pub fn extract_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Extract a non-blank query parameter from a raw query string
///
/// Values are returned verbatim (no percent-decoding); session tokens are
/// plain hex.
pub fn extract_query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.trim().is_empty()).then(|| value.to_string())
    })
}
