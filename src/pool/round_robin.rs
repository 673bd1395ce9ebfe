//! Round-robin backend pool with unhealthy-skip.

use crate::pool::Backend;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// The fixed set of backends plus the rotating selection cursor.
///
/// Membership and order are fixed at construction; the cursor is the only
/// pool-wide mutable state and is guarded by its own lock, which
/// serializes all selections. Two different backends' health locks are
/// never taken together, so there is no lock-ordering concern.
pub struct BackendPool {
    members: Vec<Arc<Backend>>,
    cursor: Mutex<usize>,
}

impl BackendPool {
    /// Create a pool from an ordered list of backends.
    ///
    /// An empty list is a configuration error caught at startup by
    /// validation; a pool constructed empty anyway simply never yields a
    /// backend.
    pub fn new(members: Vec<Arc<Backend>>) -> Self {
        Self {
            members,
            cursor: Mutex::new(0),
        }
    }

    /// Create a pool directly from backend addresses, in order.
    pub fn from_addresses<I>(addresses: I) -> Self
    where
        I: IntoIterator<Item = SocketAddr>,
    {
        Self::new(
            addresses
                .into_iter()
                .map(|address| Arc::new(Backend::new(address)))
                .collect(),
        )
    }

    /// The pool members, in rotation order.
    pub fn members(&self) -> &[Arc<Backend>] {
        &self.members
    }

    /// Number of members in the pool.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the pool has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Select the next healthy backend, rotating through the pool.
    ///
    /// The cursor advances on every step, whether or not the candidate is
    /// accepted: over any window where all members stay healthy, each is
    /// chosen exactly once per full cycle, in construction order. The
    /// walk stops at the first healthy candidate, so the common
    /// all-healthy case inspects a single member.
    ///
    /// Returns `None` when a full cycle finds no healthy member. Callers
    /// must treat that as a recoverable, request-scoped condition.
    pub fn select_next(&self) -> Option<Arc<Backend>> {
        if self.members.is_empty() {
            return None;
        }

        let mut cursor = self.cursor.lock();

        for _ in 0..self.members.len() {
            let candidate = &self.members[*cursor];
            *cursor = (*cursor + 1) % self.members.len();

            if candidate.is_healthy() {
                debug!(backend = %candidate, "selected backend");
                return Some(Arc::clone(candidate));
            }
        }

        warn!("no healthy backend in pool");
        None
    }
}
