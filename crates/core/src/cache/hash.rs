//! Request key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the storage key for a request.
///
/// The fragment never takes part in matching, so it is dropped before
/// hashing.
pub fn compute_request_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_key_stability() {
        let key1 = compute_request_key("GET", &url("https://example.com/app.js"));
        let key2 = compute_request_key("get", &url("https://example.com/app.js"));
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_ignores_fragment() {
        let plain = compute_request_key("GET", &url("https://example.com/page"));
        let fragment = compute_request_key("GET", &url("https://example.com/page#top"));
        assert_eq!(plain, fragment);
    }

    #[test]
    fn test_key_keeps_query() {
        let a = compute_request_key("GET", &url("https://example.com/page?a=1"));
        let b = compute_request_key("GET", &url("https://example.com/page?a=2"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_format() {
        let key = compute_request_key("GET", &url("https://example.com"));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
