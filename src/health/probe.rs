//! Health probe: a header-only existence check against one backend.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Ways a single probe can fail.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("probe timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Send a `HEAD /` request to the backend and return the response status.
///
/// The whole exchange (connect, write, read) is bounded by `deadline`.
/// The connection is dropped as soon as the status line has been read;
/// on the error paths there is no response to release, only the
/// half-open connection, which drops with the stream.
pub async fn probe(address: SocketAddr, deadline: Duration) -> Result<u16, ProbeError> {
    match timeout(deadline, probe_inner(address)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout),
    }
}

async fn probe_inner(address: SocketAddr) -> Result<u16, ProbeError> {
    let mut stream = TcpStream::connect(address)
        .await
        .map_err(ProbeError::Connect)?;

    let request = format!(
        "HEAD / HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        address
    );
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(ProbeError::Write)?;

    // The status line is all we need.
    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await.map_err(ProbeError::Read)?;
    if n == 0 {
        return Err(ProbeError::Malformed("empty response".to_string()));
    }

    parse_status_line(&String::from_utf8_lossy(&buf[..n]))
}

/// Whether a status code counts as a success-class response.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Parse the status code out of an HTTP response head.
fn parse_status_line(response: &str) -> Result<u16, ProbeError> {
    // Format: "HTTP/1.1 200 OK\r\n..."
    let mut parts = response.split_whitespace();
    let version = parts
        .next()
        .ok_or_else(|| ProbeError::Malformed("empty status line".to_string()))?;
    if !version.starts_with("HTTP/") {
        return Err(ProbeError::Malformed(format!(
            "unexpected protocol: {}",
            version
        )));
    }

    parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ProbeError::Malformed("missing status code".to_string()))
}
