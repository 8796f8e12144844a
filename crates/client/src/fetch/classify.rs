//! Response tainting.
//!
//! Decides which `ResponseType` a network response gets relative to the
//! scope of the controlled pages.

use pwa_cache_core::{Error, Request, RequestMode, ResponseType};
use url::Url;

use super::url::same_origin;

/// Reject requests the page is not allowed to make at all.
///
/// Only `same-origin` mode can fail before dispatch.
pub fn check_request(scope: &Url, request: &Request) -> Result<(), Error> {
    if request.mode() == RequestMode::SameOrigin && !same_origin(scope, request.url()) {
        return Err(Error::Network(format!("same-origin request to cross-origin URL {}", request.url())));
    }
    Ok(())
}

/// Classify a response that ended at `final_url`.
///
/// A response stays `basic` only when both the request and every hop up to
/// the final URL are same-origin with the scope.
pub fn classify(scope: &Url, request: &Request, final_url: &Url) -> Result<ResponseType, Error> {
    if same_origin(scope, request.url()) && same_origin(scope, final_url) {
        return Ok(ResponseType::Basic);
    }

    match request.mode() {
        RequestMode::Navigate => Ok(ResponseType::Basic),
        RequestMode::Cors => Ok(ResponseType::Cors),
        RequestMode::NoCors => Ok(ResponseType::Opaque),
        RequestMode::SameOrigin => Err(Error::Network(format!("same-origin request redirected to {final_url}"))),
    }
}
