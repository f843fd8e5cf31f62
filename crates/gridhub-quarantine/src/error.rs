//! Quarantine error types.

use thiserror::Error;

/// Result type alias for quarantine operations.
pub type QuarantineResult<T> = Result<T, QuarantineError>;

/// Errors that can occur coordinating quarantine and drain cycles.
#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("drain-restart already in progress for node: {0}")]
    DrainInProgress(String),

    #[error("registry error: {0}")]
    Registry(#[from] gridhub_registry::RegistryError),
}
