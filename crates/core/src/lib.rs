//! Core types and shared functionality for pwa-cache.
//!
//! This crate provides:
//! - Request/response model with single-consumption bodies
//! - Cache storage trait and its SQLite backend
//! - The network seam used by the worker
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod message;
pub mod network;

pub use cache::{CacheDb, CacheStorage, CachedEntry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use message::{Headers, Request, RequestMode, Response, ResponseType};
pub use network::Network;
