//! Common error types for VpsGate.

use thiserror::Error;

/// Low-level error type shared by adapters, the registry and crypto.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential hashing or verification failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// A backend rejected or failed an operation.
    #[error("Backend error: {0}")]
    Backend(String),

    /// An external command exited unsuccessfully or could not be spawned.
    #[error("Command failed: {0}")]
    Command(String),

    /// An operation did not complete within its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A background task is gone or did not answer.
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
