//! The cache worker: one struct implementing all three callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use pwa_cache_core::{CacheStorage, Error, Network, Request};

use crate::config::WorkerConfig;
use crate::filter::screen;
use crate::handler::{Interception, LifecycleHandler, WorkerHost};
use crate::lifecycle::{ActivationReport, prune_stale_stores};
use crate::strategy::CacheFirst;

/// Cache-first worker bound to one version tag.
pub struct ServiceWorker {
    config: WorkerConfig,
    storage: Arc<dyn CacheStorage>,
    strategy: CacheFirst,
}

impl ServiceWorker {
    pub fn new(config: WorkerConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        let strategy = CacheFirst::new(config.cache_name.clone(), Arc::clone(&storage), network)
            .with_max_entry_bytes(config.max_entry_bytes);
        Self { config, storage, strategy }
    }

    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Wait for cache writes scheduled by earlier intercepts.
    pub async fn settle(&self) {
        self.strategy.settle().await;
    }
}

#[async_trait]
impl LifecycleHandler for ServiceWorker {
    /// Nothing is precached; entries are added lazily by intercepts.
    async fn on_install(&self, host: &dyn WorkerHost) -> Result<(), Error> {
        tracing::info!(cache = %self.config.cache_name, "worker installing");
        host.skip_waiting().await;
        Ok(())
    }

    async fn on_activate(&self, host: &dyn WorkerHost) -> Result<ActivationReport, Error> {
        tracing::info!(cache = %self.config.cache_name, "worker activating");

        let pruned = prune_stale_stores(self.storage.as_ref(), &self.config.cache_name).await;
        let claimed = host.claim_clients().await?;

        tracing::info!(
            cache = %self.config.cache_name,
            deleted = pruned.deleted.len(),
            failed = pruned.failed.len(),
            claimed,
            "worker activated"
        );

        Ok(ActivationReport {
            kept: self.config.cache_name.clone(),
            deleted: pruned.deleted,
            failed: pruned.failed,
            claimed,
        })
    }

    async fn on_intercept(&self, request: &Request) -> Interception {
        if let Some(reason) = screen(request, &self.config.ignored_schemes) {
            tracing::debug!(url = %request.url(), %reason, "passing request through");
            return Interception::Declined(reason);
        }

        Interception::Responded(self.strategy.respond(request).await)
    }
}
