//! Monitor error types.
//!
//! Only misuse of the monitor surface is an error. A node failing its
//! probes is ordinary input to the state machine and never surfaces
//! here.

use thiserror::Error;

/// Result type alias for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors that can occur managing node monitors.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor already running for node: {0}")]
    AlreadyRegistered(String),

    #[error("no monitor for node: {0}")]
    UnknownNode(String),

    #[error("registry error: {0}")]
    Registry(#[from] gridhub_registry::RegistryError),
}
