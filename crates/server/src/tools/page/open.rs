//! page_open tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use pwa_cache_core::Error;
use pwa_cache_worker::{ClientId, WorkerId};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the page_open tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageOpenParams {
    /// Page URL, absolute or relative to the scope.
    pub url: String,
}

/// Output from the page_open tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageOpenOutput {
    pub client_id: ClientId,
    pub url: String,
    /// Worker controlling the page, if any.
    pub controller: Option<WorkerId>,
}

pub(crate) fn resolve(scope: &Url, raw: &str) -> Result<Url, Error> {
    if raw.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()));
    }
    scope.join(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))
}

/// Implementation of the page_open tool.
pub async fn open_impl(state: &AppState, params: PageOpenParams) -> Result<CallToolResult, McpError> {
    let registration = state.registration();
    let url = resolve(registration.scope(), &params.url)?;

    let client_id = registration.open_client(url.clone()).await;
    let controller = registration.controller(client_id).await;
    tracing::info!(client = client_id, url = %url, ?controller, "page opened");

    json_result(&PageOpenOutput { client_id, url: url.to_string(), controller })
}
