//! Network seam.

use async_trait::async_trait;

use crate::Error;
use crate::message::{Request, Response};

/// Issues a request to the network.
///
/// `Err` means no response arrived at all (connectivity, DNS, TLS,
/// timeout). Any HTTP status, including errors, is an `Ok` response.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
