//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod retry;
pub mod text;
pub mod url;

use ::url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .and_then(|base| resolve_url(&base, href))
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page").unwrap().as_str(),
            "https://example.com/path/page"
        );
        assert_eq!(
            resolve_url(&base, " /ilan/x ").unwrap().as_str(),
            "https://example.com/ilan/x"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x").unwrap().as_str(),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_resolve_string() {
        assert_eq!(
            resolve("https://example.com/a/b", "c"),
            Some("https://example.com/a/c".to_string())
        );
        assert_eq!(resolve("not a url", "c"), None);
    }
}
