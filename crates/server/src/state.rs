//! Shared state behind the MCP tools.

use std::sync::Arc;

use pwa_cache_client::{FetchClient, FetchConfig, canonicalize};
use pwa_cache_core::{AppConfig, CacheDb, Error};
use pwa_cache_worker::{Deployment, Registration, ServiceWorker, WorkerConfig};

/// Storage, network and the worker registration for the configured scope.
pub struct AppState {
    config: AppConfig,
    db: Arc<CacheDb>,
    network: Arc<FetchClient>,
    registration: Registration<ServiceWorker>,
}

impl AppState {
    /// Build the state from a loaded configuration and an opened database.
    pub fn new(config: AppConfig, db: CacheDb) -> Result<Self, Error> {
        let scope = canonicalize(&config.scope).map_err(|e| Error::InvalidUrl(format!("scope: {e}")))?;
        let network = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config)?)?);
        let registration = Registration::new(scope, network.clone());
        Ok(Self { config, db: Arc::new(db), network, registration })
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn registration(&self) -> &Registration<ServiceWorker> {
        &self.registration
    }

    /// Register a new worker version. Without a name the configured
    /// `cache_name` is used.
    pub async fn deploy(&self, cache_name: Option<String>) -> Result<Deployment, Error> {
        let mut worker_config = WorkerConfig::from_app_config(&self.config);
        if let Some(name) = cache_name {
            if name.trim().is_empty() {
                return Err(Error::InvalidInput("cache_name cannot be empty".into()));
            }
            worker_config.cache_name = name;
        }

        let cache_name = worker_config.cache_name.clone();
        let worker = ServiceWorker::new(worker_config, self.db.clone(), self.network.clone());
        let deployment = self.registration.register(Arc::new(worker)).await?;
        tracing::info!(cache = %cache_name, worker = deployment.worker, state = %deployment.state, "worker deployed");
        Ok(deployment)
    }
}
