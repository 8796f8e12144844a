//! cache_stores tool implementation.
//!
//! Lists the cache stores, their entry counts, and optionally the entries of
//! one store.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pwa_cache_core::{CacheStorage, CachedEntry, Error};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_stores tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStoresParams {
    /// Store whose entries should be listed.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreSummary {
    pub name: String,
    pub entries: u64,
}

/// Output from the cache_stores tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStoresOutput {
    /// Store used by the active worker, if one is active.
    pub current: Option<String>,
    pub stores: Vec<StoreSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<CachedEntry>>,
}

/// Implementation of the cache_stores tool.
pub async fn stores_impl(state: &AppState, params: CacheStoresParams) -> Result<CallToolResult, McpError> {
    let db = state.db();

    let mut stores = Vec::new();
    for name in db.keys().await? {
        let entries = db.entry_count(&name).await?;
        stores.push(StoreSummary { name, entries });
    }

    let entries = match params.name {
        Some(name) => {
            if !db.has(&name).await? {
                return Err(Error::InvalidInput(format!("no cache store named {name}")).into());
            }
            Some(db.entries(&name).await?)
        }
        None => None,
    };

    let current = state
        .registration()
        .active()
        .await
        .map(|(_, worker)| worker.cache_name().to_string());

    json_result(&CacheStoresOutput { current, stores, entries })
}
