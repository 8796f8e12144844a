//! HTTP network client for the cache worker.
//!
//! ### Request dispatch
//! - Method, URL and headers are forwarded unchanged
//! - Max redirects: 5 (configurable)
//! - Bodies are returned whole; size limits apply to caching, not fetching
//!
//! ### Response tainting
//! - Same-origin with the scope: `basic`
//! - Cross-origin `cors` mode: `cors`
//! - Cross-origin `no-cors` mode: `opaque` (status 0, no headers, empty body)

pub mod classify;
pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use classify::{check_request, classify};
pub use url::{UrlError, canonicalize, same_origin};

use pwa_cache_core::{AppConfig, Error, Headers, Network, Request, Response, ResponseType};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pwa-cache/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Origin of the controlled pages (default: http://localhost:8080/)
    pub scope: ::url::Url,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "pwa-cache/0.1".to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            scope: ::url::Url::parse("http://localhost:8080/").expect("static scope URL parses"),
        }
    }
}

impl FetchConfig {
    /// Derive the client settings from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let scope = ::url::Url::parse(&config.scope).map_err(|e| Error::InvalidUrl(format!("scope: {e}")))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
            scope,
        })
    }
}

/// HTTP network client implementing the worker's `Network` seam.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn convert_headers(headers: &header::HeaderMap) -> Headers {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v.to_string())))
        .collect()
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        check_request(&self.config.scope, request)?;

        let method = reqwest::Method::from_bytes(request.method().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method(), e)))?;

        let mut target = request.url().clone();
        target.set_fragment(None);

        let mut builder = self.http.request(method, target.clone());
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", target, e)))?;

        let status = response.status();
        let final_url = response.url().clone();
        let redirected = final_url != target;

        let response_type = classify(&self.config.scope, request, &final_url)?;
        let headers = convert_headers(response.headers());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "fetched {} -> {} {} ({}) in {}ms ({} bytes)",
            target,
            final_url,
            status.as_u16(),
            response_type,
            fetch_ms,
            bytes.len()
        );

        if response_type == ResponseType::Opaque {
            return Ok(Response::opaque(None));
        }

        Ok(Response::new(status.as_u16(), bytes)
            .with_status_text(status.canonical_reason().unwrap_or(""))
            .with_type(response_type)
            .with_url(final_url)
            .with_redirected(redirected)
            .with_headers(headers))
    }
}
