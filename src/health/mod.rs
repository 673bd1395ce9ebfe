//! Health probing for backend servers.

mod monitor;
mod probe;

pub use monitor::HealthMonitor;
pub use probe::{is_success, probe, ProbeError};
