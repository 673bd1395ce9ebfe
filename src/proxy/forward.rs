//! HTTP forwarding: relays one request to a chosen backend.
//!
//! This is the boundary collaborator of the routing core; once a target
//! has been chosen the forwarding step is a stateless pass-through.

use crate::util::RequestId;
use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tracing::{error, instrument, warn};

/// Response body type produced by the proxy path.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Relay `req` to the backend at `target` and return its response.
///
/// Any transport failure surfaces as a 502 response to the caller. The
/// backend's health flag is not touched here; health state changes only
/// through the probe cycle.
#[instrument(skip_all, fields(
    method = %req.method(),
    uri = %req.uri(),
    backend = %target,
    request_id = %request_id
))]
pub async fn forward<B>(
    mut req: Request<B>,
    target: SocketAddr,
    client_addr: SocketAddr,
    request_id: &RequestId,
) -> Response<ProxyBody>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    append_forwarding_headers(&mut req, client_addr);

    let backend_stream = match TcpStream::connect(target).await {
        Ok(stream) => {
            let _ = stream.set_nodelay(true);
            stream
        }
        Err(e) => {
            error!(error = %e, "failed to connect to backend");
            return error_response(StatusCode::BAD_GATEWAY, "failed to connect to backend");
        }
    };

    let io = TokioIo::new(backend_stream);

    let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "backend handshake failed");
            return error_response(StatusCode::BAD_GATEWAY, "backend handshake failed");
        }
    };

    // Drive the backend connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!(error = %e, "backend connection error");
        }
    });

    // Backends expect an origin-form URI, not the absolute form.
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();
    *req.uri_mut() = path_and_query
        .parse()
        .unwrap_or_else(|_| "/".parse().unwrap());

    match sender.send_request(req).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, body.boxed())
        }
        Err(e) => {
            error!(error = %e, "failed to send request to backend");
            error_response(StatusCode::BAD_GATEWAY, "failed to send request to backend")
        }
    }
}

/// Add the standard reverse-proxy headers to a request going upstream.
fn append_forwarding_headers<B>(req: &mut Request<B>, client_addr: SocketAddr) {
    let headers = req.headers_mut();

    if let Ok(value) = client_addr.ip().to_string().parse() {
        headers.insert("x-forwarded-for", value);
    }

    if let Ok(value) = client_addr.ip().to_string().parse() {
        headers.insert("x-real-ip", value);
    }
}

/// Create a plain-text error response.
pub fn error_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    let body = Full::new(Bytes::from(format!("{}: {}\n", status, message)))
        .map_err(|never| match never {})
        .boxed();

    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(body)
        .unwrap()
}
