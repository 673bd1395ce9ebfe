//! Per-backend health monitor task.
//!
//! One monitor runs per backend, probing it on a fixed cadence and
//! recording the verdict on the backend's health flag. Monitors never
//! surface probe failures to anyone; a failing backend simply stays out
//! of the rotation until a probe succeeds again.

use crate::health::{is_success, probe};
use crate::pool::Backend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Periodic health prober for a single backend.
pub struct HealthMonitor {
    backend: Arc<Backend>,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthMonitor {
    /// Create a monitor for one backend.
    pub fn new(backend: Arc<Backend>, interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            backend,
            interval,
            probe_timeout,
        }
    }

    /// Run one probe cycle and record the verdict on the backend.
    ///
    /// The flag write is last-write-wins; it races with concurrent
    /// selections by design, and a selection may use a just-stale value
    /// for at most one probe interval.
    pub async fn check_now(&self) {
        let verdict = match probe(self.backend.address(), self.probe_timeout).await {
            Ok(status) if is_success(status) => true,
            Ok(status) => {
                debug!(backend = %self.backend, status, "probe returned non-success status");
                false
            }
            Err(e) => {
                debug!(backend = %self.backend, error = %e, "probe failed");
                false
            }
        };

        let was_healthy = self.backend.is_healthy();
        self.backend.set_healthy(verdict);

        if verdict && !was_healthy {
            info!(backend = %self.backend, "backend recovered");
        } else if !verdict && was_healthy {
            warn!(backend = %self.backend, "backend marked unhealthy");
        }
    }

    /// Probe on a fixed cadence until shutdown.
    ///
    /// A probe that overruns the interval does not queue catch-up ticks;
    /// the next probe fires on the original schedule.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_now().await;
                }

                _ = shutdown.recv() => {
                    debug!(backend = %self.backend, "health monitor shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn unused_addr() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    /// Fixture server answering every connection with the given status line.
    async fn start_fixture(status_line: &'static str) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    let response =
                        format!("HTTP/1.1 {}\r\nContent-Length: 0\r\n\r\n", status_line);
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_check_now_marks_unreachable_backend_unhealthy() {
        let backend = Arc::new(Backend::new(unused_addr().await));
        let monitor = HealthMonitor::new(
            Arc::clone(&backend),
            Duration::from_secs(1),
            Duration::from_millis(200),
        );

        assert!(backend.is_healthy());
        monitor.check_now().await;
        assert!(!backend.is_healthy());
    }

    #[tokio::test]
    async fn test_check_now_marks_responsive_backend_healthy() {
        let addr = start_fixture("200 OK").await;
        let backend = Arc::new(Backend::new(addr));
        backend.set_healthy(false);

        let monitor = HealthMonitor::new(
            Arc::clone(&backend),
            Duration::from_secs(1),
            Duration::from_millis(500),
        );

        monitor.check_now().await;
        assert!(backend.is_healthy());
    }

    #[tokio::test]
    async fn test_check_now_treats_server_error_as_unhealthy() {
        let addr = start_fixture("500 Internal Server Error").await;
        let backend = Arc::new(Backend::new(addr));

        let monitor = HealthMonitor::new(
            Arc::clone(&backend),
            Duration::from_secs(1),
            Duration::from_millis(500),
        );

        monitor.check_now().await;
        assert!(!backend.is_healthy());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let backend = Arc::new(Backend::new(unused_addr().await));
        let monitor = HealthMonitor::new(
            Arc::clone(&backend),
            Duration::from_millis(20),
            Duration::from_millis(10),
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(async move {
            monitor.run(shutdown_rx).await;
        });

        // Let at least the immediate first tick land.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!backend.is_healthy());

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop on shutdown")
            .unwrap();
    }
}
