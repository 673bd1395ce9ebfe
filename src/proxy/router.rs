//! Request router: picks a backend for each request and hands off to
//! the forwarding step.

use crate::pool::BackendPool;
use crate::proxy::{error_response, forward, ProxyBody};
use crate::util::RequestId;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Response header naming the backend that served (or attempted to
/// serve) the request.
pub const UPSTREAM_HEADER: &str = "x-upstream-server";

/// Routes every inbound request through the pool to a backend.
pub struct Router {
    pool: Arc<BackendPool>,
}

impl Router {
    /// Create a router over the given pool.
    pub fn new(pool: Arc<BackendPool>) -> Self {
        Self { pool }
    }

    /// Handle one request end to end.
    ///
    /// When the pool has no healthy backend the caller gets a 503
    /// immediately; there is no retry, queueing, or backoff. A
    /// forwarding failure is likewise surfaced as-is, with no second
    /// attempt on an alternate backend.
    pub async fn route<B>(
        &self,
        req: Request<B>,
        client_addr: SocketAddr,
        request_id: &RequestId,
    ) -> Response<ProxyBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some(backend) = self.pool.select_next() else {
            warn!(request_id = %request_id, "no healthy backend available");
            return unavailable_response();
        };

        debug!(
            request_id = %request_id,
            backend = %backend,
            "routing request"
        );

        let mut response = forward(req, backend.address(), client_addr, request_id).await;

        // Stamped on the error path too, so a 502 still names the
        // backend that was attempted.
        if let Ok(value) = backend.address().to_string().parse() {
            response.headers_mut().insert(UPSTREAM_HEADER, value);
        }

        response
    }
}

/// The 503 returned when the pool is exhausted.
fn unavailable_response() -> Response<ProxyBody> {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "no healthy backend available",
    )
}
