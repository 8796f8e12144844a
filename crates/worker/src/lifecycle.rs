//! Versioned store garbage collection performed on activation.

use futures_util::future::join_all;
use pwa_cache_core::CacheStorage;
use serde::Serialize;

/// What an activation did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ActivationReport {
    /// The version tag that was kept.
    pub kept: String,
    /// Stores removed because their name differed from the version tag.
    pub deleted: Vec<String>,
    /// Stale stores whose deletion failed; they are retried on the next
    /// activation.
    pub failed: Vec<String>,
    /// Client pages controlled by the worker after claiming.
    pub claimed: usize,
}

/// Outcome of [`prune_stale_stores`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Delete every store whose name is not `keep`.
///
/// Deletions run concurrently. A failure is logged and recorded but never
/// stops the others; an enumeration failure leaves everything in place.
pub async fn prune_stale_stores(storage: &dyn CacheStorage, keep: &str) -> PruneOutcome {
    let names = match storage.keys().await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "could not enumerate cache stores, skipping cleanup");
            return PruneOutcome::default();
        }
    };

    let stale: Vec<String> = names.into_iter().filter(|name| name != keep).collect();
    let results = join_all(stale.iter().map(|name| async move {
        tracing::info!(cache = %name, "deleting stale cache store");
        (name, storage.delete(name).await)
    }))
    .await;

    let mut outcome = PruneOutcome::default();
    for (name, result) in results {
        match result {
            Ok(_) => outcome.deleted.push(name.clone()),
            Err(e) => {
                tracing::warn!(cache = %name, error = %e, "failed to delete stale cache store");
                outcome.failed.push(name.clone());
            }
        }
    }

    outcome
}
