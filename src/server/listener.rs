//! Public HTTP surface.
//!
//! Accepts incoming connections and serves every request on them (a
//! single catch-all route) through the router.

use crate::proxy::Router;
use crate::util::RequestId;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Listener that accepts and handles client connections.
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Arc<Router>,
}

impl Listener {
    /// Bind the listen address.
    pub async fn bind(listen: SocketAddr, router: Arc<Router>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(listen).await?;
        let local_addr = listener.local_addr()?;

        info!(listen = %local_addr, "listener bound");

        Ok(Self {
            listener,
            local_addr,
            router,
        })
    }

    /// The bound address. Differs from the configured one when binding
    /// port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the listener, accepting connections until shutdown.
    #[instrument(skip_all, fields(listen = %self.local_addr))]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("listener starting");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    info!("listener shutting down");
                    break;
                }
            }
        }
    }

    /// Serve one accepted connection on its own task.
    fn handle_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let router = Arc::clone(&self.router);
        let request_id = RequestId::new();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);

            let service = service_fn(move |req| {
                let router = Arc::clone(&router);
                let request_id = request_id.clone();
                async move {
                    Ok::<_, Infallible>(router.route(req, client_addr, &request_id).await)
                }
            });

            if let Err(e) = http1::Builder::new()
                .keep_alive(true)
                .serve_connection(io, service)
                .await
            {
                debug!(client = %client_addr, error = %e, "connection closed with error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::BackendPool;

    #[tokio::test]
    async fn test_listener_bind() {
        let pool = Arc::new(BackendPool::from_addresses(vec![
            "127.0.0.1:9001".parse().unwrap(),
        ]));
        let router = Arc::new(Router::new(pool));

        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), router).await;
        assert!(listener.is_ok());
        assert_ne!(listener.unwrap().local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_listener_bind_conflict() {
        let pool = Arc::new(BackendPool::from_addresses(vec![
            "127.0.0.1:9001".parse().unwrap(),
        ]));
        let router = Arc::new(Router::new(pool));

        let first = Listener::bind("127.0.0.1:0".parse().unwrap(), Arc::clone(&router))
            .await
            .unwrap();

        let second = Listener::bind(first.local_addr(), router).await;
        assert!(second.is_err());
    }
}
