//! Client page MCP tools.
//!
//! Pages stand in for browser tabs: they are opened under a URL, may be
//! controlled by the active worker, and issue requests through it.

pub mod close;
pub mod fetch;
pub mod open;

pub use close::{PageCloseParams, close_impl};
pub use fetch::{PageFetchParams, fetch_impl};
pub use open::{PageOpenParams, open_impl};
