//! Callback interface between a worker and the host that runs it.
//!
//! The host owns the lifecycle: it calls `on_install` once, `on_activate`
//! when the version becomes active, and `on_intercept` for every request a
//! controlled page makes. A transition is not finished until the returned
//! future resolves, so anything awaited inside a callback is covered by the
//! host's lifetime extension.

use async_trait::async_trait;
use pwa_cache_core::{Error, Request};

use crate::filter::Decline;
use crate::lifecycle::ActivationReport;
use crate::strategy::Served;

/// Services the host exposes to lifecycle callbacks.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Activate this version as soon as installation finishes instead of
    /// waiting for pages controlled by the previous version to close.
    async fn skip_waiting(&self);

    /// Take control of every open client page in scope. Returns how many
    /// clients are now controlled by this worker.
    async fn claim_clients(&self) -> Result<usize, Error>;
}

/// Result of offering a request to the worker.
#[derive(Debug)]
pub enum Interception {
    /// The host should handle the request itself, unmodified.
    Declined(Decline),
    /// The worker's response replaces the default network response.
    Responded(Served),
}

/// The three lifecycle callbacks of a worker.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    async fn on_install(&self, host: &dyn WorkerHost) -> Result<(), Error>;

    async fn on_activate(&self, host: &dyn WorkerHost) -> Result<ActivationReport, Error>;

    async fn on_intercept(&self, request: &Request) -> Interception;
}
