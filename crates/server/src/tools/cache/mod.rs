//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting the SQLite-backed cache storage.

pub mod stores;

pub use stores::{CacheStoresParams, stores_impl};
