//! Error types for distributed lock operations.

use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// Lock operation was cancelled by the caller.
    #[error("lock operation was cancelled")]
    Cancelled,

    /// Invalid lock name or lock location.
    #[error("invalid lock name: {0}")]
    InvalidName(String),

    /// Backend connection is unusable (e.g., the client was closed).
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    /// Returns `true` if this error reports a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
