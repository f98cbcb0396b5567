//! Error types for the cache crate.

use thiserror::Error;

/// Errors raised by a key-value store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("cache store unreachable: {0}")]
    Connectivity(String),

    /// The store rejected a command.
    #[error("cache command failed: {0}")]
    Command(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            StoreError::Connectivity(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Errors surfaced by the cache binding.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Key-value store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Payload could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, CacheError::Store(StoreError::Connectivity(_)))
    }
}
