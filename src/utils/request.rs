//! Request identity helpers
//!
//! Builds the canonical URL form a call is keyed under. Two calls that
//! differ only in query-pair order derive the same key, so they are
//! treated as the same logical request.

use http::Method;

use crate::core::key::RequestKey;

/// Join a base URL and a path, normalizing the slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// Render query pairs in canonical order (by name, then value).
///
/// Values are assumed to be already encoded by the caller; pairs are
/// joined verbatim.
pub fn canonical_query(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    sorted
        .iter()
        .map(|pair| format!("{}={}", pair.0, pair.1))
        .collect::<Vec<_>>()
        .join("&")
}

/// Append a rendered query string to a URL, if there is one.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_string()
    } else {
        format!("{url}?{query}")
    }
}

/// Derive a stable request key from the method and the canonical URL.
///
/// Used when the call site supplies no explicit key.
pub fn derive_request_key(method: &Method, url: &str) -> RequestKey {
    RequestKey::Name(format!("{method} {url}"))
}
