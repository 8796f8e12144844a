//! pwa-cache server entry point.
//!
//! Loads configuration, opens the cache database, deploys the configured
//! worker version and serves the MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use pwa_cache_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        cache = %config.cache_name,
        scope = %config.scope,
        db = %config.db_path.display(),
        "Starting pwa-cache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let state = Arc::new(state::AppState::new(config, db)?);
    state.deploy(None).await?;

    let handler = handler::PwaCacheServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
