//! Error types for lotbook-core

use thiserror::Error;

/// Result type alias using lotbook-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lotbook-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Offline storage is unavailable or rejected a read/write.
    ///
    /// Fatal to all offline features; callers must surface it rather than
    /// silently drop data.
    #[error("Offline storage unavailable: {0}")]
    StorageUnavailable(#[from] libsql::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
