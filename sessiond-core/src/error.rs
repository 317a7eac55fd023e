//! Error types for sessiond-core.

use thiserror::Error;

/// Result type alias using sessiond-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for session lifecycle operations
#[derive(Error, Debug)]
pub enum Error {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    // Session errors
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session reached `ended`. Distinct from `SessionNotFound` so callers
    /// know to stop heartbeating instead of retrying.
    #[error("Session has ended: {0}")]
    SessionEnded(String),

    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error reports a session that never existed or was erased.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_))
    }

    /// Whether this error reports a session that has already ended.
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::SessionEnded(_))
    }
}
