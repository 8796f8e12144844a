//! Outgoing resource request as presented by the host.

use serde::{Deserialize, Serialize};
use url::Url;

use super::Headers;
use crate::Error;

/// Fetch mode of a request, which decides how cross-origin responses are
/// exposed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

/// An immutable request descriptor.
///
/// The worker only ever borrows requests; fields are private so nothing
/// downstream of the host can rewrite them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: Url,
    headers: Headers,
    mode: RequestMode,
}

impl Request {
    /// Build a request. The method is normalized to uppercase.
    pub fn new(method: impl AsRef<str>, url: Url) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            url,
            headers: Headers::new(),
            mode: RequestMode::default(),
        }
    }

    /// Shorthand for a `GET` request to a parsed URL.
    pub fn get(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new("GET", url))
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}
