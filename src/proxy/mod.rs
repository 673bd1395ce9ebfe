//! Request routing and HTTP forwarding.

mod forward;
mod router;

pub use forward::{error_response, forward, ProxyBody};
pub use router::{Router, UPSTREAM_HEADER};
