//! Request and response model shared by the worker, its hosts, and the
//! network client.

mod headers;
mod request;
mod response;

pub use headers::Headers;
pub use request::{Request, RequestMode};
pub use response::{Response, ResponseType};
