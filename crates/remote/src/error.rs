//! Error types for the remote API crate.

use thiserror::Error;

/// Result type alias for remote API operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Coarse error classification consumed by retry and orchestration logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    Auth,
    RateLimit,
    NotFound,
    Validation,
    Network,
}

/// Errors that can occur when talking to the remote service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level HTTP error (connect, timeout, body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 401/403 from the remote service
    #[error("Authentication error: {0}")]
    Auth(String),

    /// 429 from the remote service, with an optional Retry-After hint
    #[error("Rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    /// 404 from the remote service
    #[error("Not found: {0}")]
    NotFound(String),

    /// 400/422 from the remote service
    #[error("Validation error: {0}")]
    Validation(String),

    /// 5xx, unexpected status, or an unparseable success body
    #[error("Remote service error: {0}")]
    Network(String),
}

impl RemoteError {
    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a rate-limit error
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a network/server error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Classify this error for retry decisions.
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            Self::Http(_) => RemoteErrorKind::Network,
            Self::Auth(_) => RemoteErrorKind::Auth,
            Self::RateLimit { .. } => RemoteErrorKind::RateLimit,
            Self::NotFound(_) => RemoteErrorKind::NotFound,
            Self::Validation(_) => RemoteErrorKind::Validation,
            Self::Network(_) => RemoteErrorKind::Network,
        }
    }

    /// Retry-After hint in seconds, if the remote provided one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_every_variant() {
        assert_eq!(RemoteError::auth("x").kind(), RemoteErrorKind::Auth);
        assert_eq!(
            RemoteError::rate_limit("x", Some(3)).kind(),
            RemoteErrorKind::RateLimit
        );
        assert_eq!(RemoteError::not_found("x").kind(), RemoteErrorKind::NotFound);
        assert_eq!(
            RemoteError::validation("x").kind(),
            RemoteErrorKind::Validation
        );
        assert_eq!(RemoteError::network("x").kind(), RemoteErrorKind::Network);
    }

    #[test]
    fn retry_after_only_set_for_rate_limit() {
        assert_eq!(
            RemoteError::rate_limit("slow down", Some(7)).retry_after_secs(),
            Some(7)
        );
        assert_eq!(RemoteError::network("boom").retry_after_secs(), None);
    }
}
