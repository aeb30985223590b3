//! Shared error and result types for hourbook core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Persistence-layer failure categories surfaced through [`Error::Database`].
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("{0}")]
    Internal(String),
}

/// Errors surfaced to callers of the core services.
#[derive(Debug, Error)]
pub enum Error {
    /// Persistence failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// No remote connection is configured for the user
    #[error("No remote connection configured for user {0}")]
    ConnectionMissing(String),

    /// Another sync run already holds the per-connection run slot
    #[error("A sync run is already in progress for connection {0}")]
    SyncInProgress(String),

    /// The whole-run wall-clock budget elapsed
    #[error("Sync run timed out after {0} seconds")]
    Timeout(u64),

    /// Remote API failure that escaped per-unit handling
    #[error("Remote API error: {0}")]
    Remote(#[from] hourbook_remote::RemoteError),

    /// Caller or programmer error
    #[error("Invalid input: {0}")]
    Validation(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything unanticipated
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
