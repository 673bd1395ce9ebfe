//! Backend entity: one proxied server instance.

use parking_lot::Mutex;
use std::net::SocketAddr;

/// One proxied server instance behind the load balancer.
///
/// The address is fixed for the process lifetime. The health flag is the
/// only mutable state and is guarded by its own lock, so the probe task
/// and the selection path touch it independently; readers and writers
/// need nothing more than last-write-wins on a single boolean.
#[derive(Debug)]
pub struct Backend {
    address: SocketAddr,
    healthy: Mutex<bool>,
}

impl Backend {
    /// Create a backend for the given address.
    ///
    /// New backends start healthy; the first probe cycle corrects the
    /// flag if the server is actually down.
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            healthy: Mutex::new(true),
        }
    }

    /// The backend's network address.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Read the health flag. The lock is held only for the read.
    pub fn is_healthy(&self) -> bool {
        *self.healthy.lock()
    }

    /// Overwrite the health flag.
    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock() = healthy;
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}
