//! Registry error types.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur against the node table or session pool.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("node already registered: {0}")]
    DuplicateNode(String),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("node not accepting sessions: {0}")]
    NotAccepting(String),
}
