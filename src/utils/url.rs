// src/utils/url.rs

//! Listing address helpers: canonical identity and slug access.

use percent_encoding::percent_decode_str;
use url::Url;

/// Canonical identity for a listing address.
///
/// `scheme://host[:port]/path` with query and fragment dropped and any
/// trailing slash stripped. Unparseable input is trimmed and returned as-is
/// minus the trailing slash.
pub fn canonical_identity(address: &str) -> String {
    match Url::parse(address.trim()) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => address.trim().trim_end_matches('/').to_string(),
    }
}

/// Drop the fragment of an absolute URL, keeping everything else.
pub fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// The last non-empty path segment of an address, percent-decoded.
pub fn last_path_segment(address: &str) -> Option<String> {
    let url = Url::parse(address).ok()?;
    let segment = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;
    Some(percent_decode_str(segment).decode_utf8_lossy().into_owned())
}

/// Whether `path` lies under `prefix` with a non-empty remainder.
///
/// A path equal to the prefix (optionally with a trailing slash) is a
/// category root, not a detail page.
pub fn is_detail_path(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) if rest.starts_with('/') => !rest.trim_matches('/').is_empty(),
        _ => false,
    }
}
