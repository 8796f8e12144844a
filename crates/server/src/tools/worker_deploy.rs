//! worker_deploy tool implementation.
//!
//! Registers a new worker version, optionally under a different cache name.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::AppState;

/// Parameters for the worker_deploy tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerDeployParams {
    /// Version tag for the new worker's cache store. Defaults to the
    /// configured cache name.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Implementation of the worker_deploy tool.
pub async fn deploy_impl(state: &AppState, params: WorkerDeployParams) -> Result<CallToolResult, McpError> {
    let deployment = state.deploy(params.cache_name).await?;
    json_result(&deployment)
}
