//! Response snapshot with a single-consumption body.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use super::Headers;
use crate::Error;

/// Classification of a response relative to the requesting page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin and fully inspectable.
    Basic,
    /// Cross-origin, exposed through CORS.
    Cors,
    /// Built locally rather than received from the network.
    Default,
    /// Network error surrogate.
    Error,
    /// Cross-origin `no-cors`; status, headers and body are hidden.
    Opaque,
    /// Redirect returned under manual redirect mode.
    #[serde(rename = "opaqueredirect")]
    OpaqueRedirect,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Default => "default",
            ResponseType::Error => "error",
            ResponseType::Opaque => "opaque",
            ResponseType::OpaqueRedirect => "opaqueredirect",
        }
    }
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseType::Basic),
            "cors" => Ok(ResponseType::Cors),
            "default" => Ok(ResponseType::Default),
            "error" => Ok(ResponseType::Error),
            "opaque" => Ok(ResponseType::Opaque),
            "opaqueredirect" => Ok(ResponseType::OpaqueRedirect),
            other => Err(Error::CorruptEntry(format!("unknown response type: {other}"))),
        }
    }
}

/// A response whose body can be read exactly once.
///
/// Call [`Response::try_clone`] before reading to obtain an independent
/// copy; cloning after the body was taken fails with [`Error::BodyUsed`].
#[derive(Debug)]
pub struct Response {
    status: u16,
    status_text: String,
    response_type: ResponseType,
    url: Option<Url>,
    redirected: bool,
    headers: Headers,
    body: Option<Bytes>,
}

impl Response {
    /// A locally built response of type `default`.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: canonical_reason(status).to_string(),
            response_type: ResponseType::Default,
            url: None,
            redirected: false,
            headers: Headers::new(),
            body: Some(body.into()),
        }
    }

    /// Terminal outcome for a request the worker could answer neither from
    /// cache nor from the network.
    pub fn unavailable() -> Self {
        let mut response = Self::new(503, Bytes::from_static(b"network unavailable"));
        response.response_type = ResponseType::Error;
        response.headers.set("content-type", "text/plain; charset=utf-8");
        response
    }

    /// Opaque filtered view of a cross-origin `no-cors` response.
    pub fn opaque(url: Option<Url>) -> Self {
        Self {
            status: 0,
            status_text: String::new(),
            response_type: ResponseType::Opaque,
            url,
            redirected: false,
            headers: Headers::new(),
            body: Some(Bytes::new()),
        }
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_redirected(mut self, redirected: bool) -> Self {
        self.redirected = redirected;
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn redirected(&self) -> bool {
        self.redirected
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Whether the status is in the 200-299 range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_used(&self) -> bool {
        self.body.is_none()
    }

    /// Duplicate the response into an independently consumable copy.
    pub fn try_clone(&self) -> Result<Self, Error> {
        let body = self.body.clone().ok_or(Error::BodyUsed)?;
        Ok(Self {
            status: self.status,
            status_text: self.status_text.clone(),
            response_type: self.response_type,
            url: self.url.clone(),
            redirected: self.redirected,
            headers: self.headers.clone(),
            body: Some(body),
        })
    }

    /// Length of the unread body, or `None` once it has been consumed.
    pub fn body_len(&self) -> Option<usize> {
        self.body.as_ref().map(Bytes::len)
    }

    /// Consume the body.
    pub fn bytes(&mut self) -> Result<Bytes, Error> {
        self.body.take().ok_or(Error::BodyUsed)
    }

    /// Consume the body as lossy UTF-8 text.
    pub fn text(&mut self) -> Result<String, Error> {
        let bytes = self.bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn canonical_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
