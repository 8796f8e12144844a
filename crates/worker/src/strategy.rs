//! Cache-first retrieval strategy.
//!
//! Looks the request up in the worker's store and answers from there when it
//! can. On a miss the request goes to the network; a `200` `basic` response
//! that was not redirected and fits the size limit is duplicated and the copy
//! is written back in a detached task while the original is returned.
//! Everything else passes through untouched.
//!
//! Two concurrent misses for the same request both fetch and both write; the
//! later write wins.

use std::sync::Arc;

use pwa_cache_core::{CacheStorage, Network, Request, Response, ResponseType};
use serde::Serialize;
use tokio_util::task::TaskTracker;

/// Where a response handed back by the strategy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Stored response; no network call was made.
    Cache,
    /// Network response passed through without storing.
    Network,
    /// Network response whose copy was scheduled for storage.
    NetworkStored,
    /// Network failed; the synthetic 503 was returned.
    Unavailable,
}

/// A response together with its provenance.
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub source: Source,
}

/// Whether a network response may be written to the store.
pub fn is_storable(response: &Response, max_bytes: usize) -> bool {
    response.status() == 200
        && response.response_type() == ResponseType::Basic
        && !response.redirected()
        && response.body_len().is_some_and(|len| len <= max_bytes)
}

/// Cache-first strategy bound to one named store.
pub struct CacheFirst {
    cache_name: String,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    max_entry_bytes: usize,
    writes: TaskTracker,
}

impl CacheFirst {
    pub fn new(cache_name: impl Into<String>, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            cache_name: cache_name.into(),
            storage,
            network,
            max_entry_bytes: 5 * 1024 * 1024,
            writes: TaskTracker::new(),
        }
    }

    /// Set the largest body that will be stored.
    pub fn with_max_entry_bytes(mut self, max_entry_bytes: usize) -> Self {
        self.max_entry_bytes = max_entry_bytes;
        self
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Answer an eligible request.
    ///
    /// Never fails: storage errors degrade to a miss and network errors to
    /// [`Response::unavailable`].
    pub async fn respond(&self, request: &Request) -> Served {
        match self.storage.match_request(&self.cache_name, request).await {
            Ok(Some(response)) => {
                tracing::debug!(url = %request.url(), cache = %self.cache_name, "cache hit");
                return Served { response, source: Source::Cache };
            }
            Ok(None) => {
                tracing::debug!(url = %request.url(), cache = %self.cache_name, "cache miss");
            }
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "cache lookup failed, using network");
            }
        }

        let response = match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(url = %request.url(), error = %e, "network fetch failed with no cached copy");
                return Served { response: Response::unavailable(), source: Source::Unavailable };
            }
        };

        if !is_storable(&response, self.max_entry_bytes) {
            tracing::debug!(
                url = %request.url(),
                status = response.status(),
                response_type = %response.response_type(),
                redirected = response.redirected(),
                "response not storable"
            );
            return Served { response, source: Source::Network };
        }

        match response.try_clone() {
            Ok(copy) => {
                self.store_in_background(request.clone(), copy);
                Served { response, source: Source::NetworkStored }
            }
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "could not duplicate response for caching");
                Served { response, source: Source::Network }
            }
        }
    }

    fn store_in_background(&self, request: Request, response: Response) {
        let storage = Arc::clone(&self.storage);
        let cache_name = self.cache_name.clone();
        self.writes.spawn(async move {
            match storage.put(&cache_name, &request, response).await {
                Ok(()) => tracing::debug!(url = %request.url(), cache = %cache_name, "stored response"),
                Err(e) => tracing::warn!(url = %request.url(), cache = %cache_name, error = %e, "cache write failed"),
            }
        });
    }

    /// Number of background writes still running.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Wait until every background write scheduled so far has finished.
    pub async fn settle(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}
