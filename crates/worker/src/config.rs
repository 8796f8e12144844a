//! Per-worker settings injected at construction.

use pwa_cache_core::AppConfig;

/// Settings a `ServiceWorker` is built with.
///
/// Two workers with different `cache_name`s are two deployments; the newer
/// one deletes the older one's store when it activates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Version tag naming the only store this worker reads and writes.
    pub cache_name: String,

    /// URL schemes that are never intercepted.
    pub ignored_schemes: Vec<String>,

    /// Largest response body written to the store. Bigger responses are
    /// still returned, just not cached.
    pub max_entry_bytes: usize,
}

impl WorkerConfig {
    pub fn new(cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            ignored_schemes: vec!["chrome-extension".to_string()],
            max_entry_bytes: 5 * 1024 * 1024,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            cache_name: config.cache_name.clone(),
            ignored_schemes: config.ignored_schemes.clone(),
            max_entry_bytes: config.max_bytes,
        }
    }
}
