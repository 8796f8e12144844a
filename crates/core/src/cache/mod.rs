//! SQLite-backed cache storage.
//!
//! Holds any number of named stores, each a request→response mapping.
//! Access is async through tokio-rusqlite:
//!
//! - SHA-256 request keys (method + URL without fragment)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Store deletion cascades to its entries

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use storage::{CacheStorage, CachedEntry};
