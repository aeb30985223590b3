//! Storage error types and conversions into core errors.

use diesel::result::DatabaseErrorKind;
use thiserror::Error;

use hourbook_core::errors::{DatabaseError, Error};

/// Errors raised by the SQLite storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database query failed: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl StorageError {
    /// True when the underlying failure is a unique (or partial-unique)
    /// constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Diesel(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            ))
        )
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        if err.is_unique_violation() {
            return Error::Database(DatabaseError::UniqueViolation(err.to_string()));
        }
        let message = err.to_string();
        match err {
            StorageError::Diesel(diesel::result::Error::NotFound) => {
                Error::Database(DatabaseError::NotFound(message))
            }
            StorageError::Pool(_) => Error::Database(DatabaseError::Pool(message)),
            _ => Error::Database(DatabaseError::Internal(message)),
        }
    }
}
