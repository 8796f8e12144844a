//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::AppState;
use crate::tools::cache::{CacheStoresParams, stores_impl};
use crate::tools::page::{PageCloseParams, PageFetchParams, PageOpenParams, close_impl, fetch_impl, open_impl};
use crate::tools::worker_deploy::{WorkerDeployParams, deploy_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for pwa-cache.
#[derive(Clone)]
pub struct PwaCacheServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PwaCacheServer {
    /// Create a new server handler over shared state.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    /// Register a new worker version.
    #[tool(
        description = "Deploy a new cache worker version. A new cache_name replaces the previous store on activation."
    )]
    async fn worker_deploy(&self, params: Parameters<WorkerDeployParams>) -> Result<CallToolResult, McpError> {
        deploy_impl(&self.state, params.0).await
    }

    #[tool(description = "Open a client page at a URL. In-scope pages are controlled by the active worker.")]
    async fn page_open(&self, params: Parameters<PageOpenParams>) -> Result<CallToolResult, McpError> {
        open_impl(&self.state, params.0).await
    }

    #[tool(description = "Close a client page. May let a waiting worker activate.")]
    async fn page_close(&self, params: Parameters<PageCloseParams>) -> Result<CallToolResult, McpError> {
        close_impl(&self.state, params.0).await
    }

    /// Issue a request from a page.
    ///
    /// Controlled pages are answered cache-first by their worker. The output
    /// reports whether the response came from the cache or the network.
    #[tool(
        description = "Fetch a URL from an open page. Controlled pages are served cache-first; the route field tells where the response came from."
    )]
    async fn page_fetch(&self, params: Parameters<PageFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "List cache stores with entry counts. Pass a name to list that store's entries.")]
    async fn cache_stores(&self, params: Parameters<CacheStoresParams>) -> Result<CallToolResult, McpError> {
        stores_impl(&self.state, params.0).await
    }
}

impl ServerHandler for PwaCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "pwa-cache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
