//! Network client for pwa-cache.
//!
//! This crate provides the reqwest-backed implementation of the worker's
//! `Network` seam, including response tainting relative to the page scope.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, canonicalize, same_origin};
