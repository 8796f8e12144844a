//! page_fetch tool implementation.
//!
//! Issues a request from an open page. Controlled pages go through their
//! worker; everything else goes straight to the network.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pwa_cache_core::{Request, RequestMode, ResponseType};
use pwa_cache_worker::{ClientId, Route};

use super::open::resolve;
use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the page_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageFetchParams {
    /// Page issuing the request.
    pub client_id: ClientId,

    /// Request URL, absolute or relative to the scope.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Fetch mode (default: no-cors).
    #[serde(default)]
    pub mode: RequestMode,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the page_fetch tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PageFetchOutput {
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub url: Option<String>,
    pub redirected: bool,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub body_bytes: usize,
    /// Who produced the response.
    pub route: Route,
}

/// Implementation of the page_fetch tool.
pub async fn fetch_impl(state: &AppState, params: PageFetchParams) -> Result<CallToolResult, McpError> {
    let registration = state.registration();
    let url = resolve(registration.scope(), &params.url)?;

    let request = params
        .headers
        .iter()
        .fold(Request::new(&params.method, url), |req, (name, value)| req.with_header(name, value.clone()))
        .with_mode(params.mode);

    let routed = registration.fetch(params.client_id, &request).await?;
    let mut response = routed.response;
    let body = response.bytes()?;

    tracing::debug!(
        client = params.client_id,
        url = %request.url(),
        status = response.status(),
        route = ?routed.route,
        "page fetch complete"
    );

    json_result(&PageFetchOutput {
        status: response.status(),
        status_text: response.status_text().to_string(),
        response_type: response.response_type(),
        url: response.url().map(ToString::to_string),
        redirected: response.redirected(),
        headers: response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
        body_bytes: body.len(),
        route: routed.route,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{serve_forever, state_for, state_with};
    use crate::tools::output_json;
    use pwa_cache_core::AppConfig;
    use url::Url;

    const OK: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/javascript\r\nContent-Length: 9\r\nConnection: close\r\n\r\nconsole;\n";

    fn get(client_id: ClientId, url: &str) -> PageFetchParams {
        PageFetchParams {
            client_id,
            url: url.to_string(),
            method: default_method(),
            headers: BTreeMap::new(),
            mode: RequestMode::default(),
        }
    }

    async fn settle(state: &AppState) {
        if let Some((_, worker)) = state.registration().active().await {
            worker.settle().await;
        }
    }

    #[tokio::test]
    async fn test_controlled_page_is_served_from_cache_second_time() {
        let base = serve_forever(OK).await;
        let state = state_for(&base).await;
        state.deploy(None).await.unwrap();
        let client = state.registration().open_client(Url::parse(&base).unwrap()).await;

        let first = output_json(&fetch_impl(&state, get(client, "app.js")).await.unwrap());
        assert_eq!(first["status"], 200);
        assert_eq!(first["response_type"], "basic");
        assert_eq!(first["route"]["via"], "worker");
        assert_eq!(first["route"]["source"], "network_stored");
        assert_eq!(first["body"], "console;\n");

        settle(&state).await;

        let second = output_json(&fetch_impl(&state, get(client, "app.js")).await.unwrap());
        assert_eq!(second["route"]["source"], "cache");
        assert_eq!(second["body"], "console;\n");
        assert_eq!(state.db().entry_count("my-pwa-cache-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_post_is_declined_and_not_cached() {
        let base = serve_forever(OK).await;
        let state = state_for(&base).await;
        state.deploy(None).await.unwrap();
        let client = state.registration().open_client(Url::parse(&base).unwrap()).await;

        let mut params = get(client, "api");
        params.method = "post".into();
        params.headers.insert("content-type".into(), "application/json".into());

        let output = output_json(&fetch_impl(&state, params).await.unwrap());
        assert_eq!(output["route"]["via"], "declined");
        assert_eq!(output["route"]["reason"]["reason"], "method");

        settle(&state).await;
        assert_eq!(state.db().entry_count("my-pwa-cache-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_uncontrolled_page_bypasses_worker() {
        let base = serve_forever(OK).await;
        let state = state_for(&base).await;
        let client = state.registration().open_client(Url::parse(&base).unwrap()).await;

        let output = output_json(&fetch_impl(&state, get(client, "app.js")).await.unwrap());
        assert_eq!(output["route"]["via"], "uncontrolled");
        assert_eq!(output["status"], 200);
    }

    #[tokio::test]
    async fn test_unreachable_origin_yields_503() {
        let state = state_for("http://127.0.0.1:9/").await;
        state.deploy(None).await.unwrap();
        let client = state
            .registration()
            .open_client(Url::parse("http://127.0.0.1:9/").unwrap())
            .await;

        let output = output_json(&fetch_impl(&state, get(client, "offline")).await.unwrap());
        assert_eq!(output["status"], 503);
        assert_eq!(output["response_type"], "error");
        assert_eq!(output["route"]["source"], "unavailable");
    }

    #[tokio::test]
    async fn test_body_over_limit_passes_through_uncached() {
        let base =
            serve_forever("HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\n0123456789").await;
        let state = state_with(AppConfig { scope: base.clone(), max_bytes: 4, ..Default::default() }).await;
        state.deploy(None).await.unwrap();
        let client = state.registration().open_client(Url::parse(&base).unwrap()).await;

        let output = output_json(&fetch_impl(&state, get(client, "big.bin")).await.unwrap());
        assert_eq!(output["status"], 200);
        assert_eq!(output["response_type"], "basic");
        assert_eq!(output["route"]["source"], "network");
        assert_eq!(output["body"], "0123456789");

        settle(&state).await;
        assert_eq!(state.db().entry_count("my-pwa-cache-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let state = state_for("http://localhost:8080/").await;
        assert!(fetch_impl(&state, get(7, "app.js")).await.is_err());
    }
}
