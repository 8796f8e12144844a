//! Cache-first offline worker.
//!
//! [`ServiceWorker`] implements the three lifecycle callbacks against a
//! [`CacheStorage`](pwa_cache_core::CacheStorage) and a
//! [`Network`](pwa_cache_core::Network). [`Registration`] hosts worker
//! versions in-process: it installs and activates them, tracks client pages,
//! and routes their requests.

pub mod config;
pub mod filter;
pub mod handler;
pub mod lifecycle;
pub mod registration;
pub mod strategy;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::WorkerConfig;
pub use filter::{Decline, screen};
pub use handler::{Interception, LifecycleHandler, WorkerHost};
pub use lifecycle::{ActivationReport, PruneOutcome, prune_stale_stores};
pub use registration::{ClientId, ClientInfo, Deployment, Handover, Registration, Route, Routed, WorkerId, WorkerState};
pub use strategy::{CacheFirst, Served, Source, is_storable};
pub use worker::ServiceWorker;
