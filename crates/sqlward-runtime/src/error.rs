//! Error types for the query layer.

use serde::Serialize;
use sqlward_cache::CacheError;
use sqlward_sanitize::SanitizeError;
use std::fmt;
use thiserror::Error;

/// Normalized failure class reported by a connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolErrorKind {
    /// Server unreachable, connection dropped, pool closed.
    Connectivity,
    /// Acquiring a connection or running the statement timed out.
    Timeout,
    /// Bad statement, unknown table or column, wrong parameter count.
    Programming,
    /// Constraint violation.
    Integrity,
}

impl fmt::Display for PoolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PoolErrorKind::Connectivity => "connectivity",
            PoolErrorKind::Timeout => "timeout",
            PoolErrorKind::Programming => "programming",
            PoolErrorKind::Integrity => "integrity",
        };
        f.write_str(label)
    }
}

/// Failure reported by a [`ConnectionPool`](crate::ConnectionPool).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("database {kind} error: {message}")]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
}

impl PoolError {
    pub fn new(kind: PoolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(PoolErrorKind::Connectivity, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PoolErrorKind::Timeout, message)
    }

    pub fn programming(message: impl Into<String>) -> Self {
        Self::new(PoolErrorKind::Programming, message)
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::new(PoolErrorKind::Integrity, message)
    }

    /// Whether the backend could not be reached in time.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.kind,
            PoolErrorKind::Connectivity | PoolErrorKind::Timeout
        )
    }
}

/// Errors returned by every query operation.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Caller input was rejected before reaching the database.
    #[error("unsafe input rejected: {0}")]
    Injection(#[from] SanitizeError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Input is well-formed but unusable (empty column list, short row).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl QueryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidInput(message.into())
    }

    pub fn is_injection(&self) -> bool {
        matches!(self, QueryError::Injection(_))
    }

    /// Database or cache store unreachable.
    pub fn is_connectivity(&self) -> bool {
        match self {
            QueryError::Pool(err) => err.is_connectivity(),
            QueryError::Cache(err) => err.is_connectivity(),
            _ => false,
        }
    }
}
