//! Cache error types

use thiserror::Error;

/// Errors that can occur during cache operations
///
/// A miss is not an error: backends report it as `Ok(None)`. The split
/// between `BackendUnavailable` and everything else is what
/// [`BackendSupervisor`](crate::cache::BackendSupervisor) watches to decide
/// on failover.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Backend could not be reached: connect failure, broken connection,
    /// protocol error or per-call timeout
    #[error("Cache backend '{backend}' unavailable: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// Failed to serialize or deserialize a cached value
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    pub fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        CacheError::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CacheError::BackendUnavailable { .. })
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
