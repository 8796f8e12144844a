//! Interception filter.
//!
//! Runs before any I/O and only reads the request.

use pwa_cache_core::Request;
use serde::Serialize;

/// Why a request was left to the host's default network handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "reason", content = "value", rename_all = "snake_case")]
pub enum Decline {
    /// Only `GET` is intercepted.
    Method(String),
    /// Internal extension resource.
    Scheme(String),
}

impl std::fmt::Display for Decline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decline::Method(method) => write!(f, "method {method} is not intercepted"),
            Decline::Scheme(scheme) => write!(f, "scheme {scheme} is not intercepted"),
        }
    }
}

/// Decide whether `request` is handed to the retrieval strategy.
///
/// Returns `None` for eligible requests.
pub fn screen(request: &Request, ignored_schemes: &[String]) -> Option<Decline> {
    if !request.is_get() {
        return Some(Decline::Method(request.method().to_string()));
    }

    let scheme = request.url().scheme();
    if ignored_schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return Some(Decline::Scheme(scheme.to_string()));
    }

    None
}
