//! page_close tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pwa_cache_worker::{ClientId, Handover};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the page_close tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageCloseParams {
    pub client_id: ClientId,
}

/// Output from the page_close tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PageCloseOutput {
    pub client_id: ClientId,
    /// Set when closing the page let a waiting worker activate, including
    /// its activation error if the callback failed.
    pub handover: Option<Handover>,
}

/// Implementation of the page_close tool.
pub async fn close_impl(state: &AppState, params: PageCloseParams) -> Result<CallToolResult, McpError> {
    let handover = state.registration().close_client(params.client_id).await?;
    tracing::info!(
        client = params.client_id,
        activated = handover.as_ref().map(|h| h.worker),
        "page closed"
    );

    json_result(&PageCloseOutput { client_id: params.client_id, handover })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::state_for;
    use crate::tools::output_json;
    use url::Url;

    #[tokio::test]
    async fn test_close_open_page() {
        let state = state_for("http://localhost:8080/").await;
        let client_id = state
            .registration()
            .open_client(Url::parse("http://localhost:8080/").unwrap())
            .await;

        let output = output_json(&close_impl(&state, PageCloseParams { client_id }).await.unwrap());
        assert_eq!(output["client_id"], client_id);
        assert!(output["handover"].is_null());
        assert!(state.registration().clients().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_unknown_page() {
        let state = state_for("http://localhost:8080/").await;
        let result = close_impl(&state, PageCloseParams { client_id: 99 }).await;
        assert!(result.is_err());
    }
}
