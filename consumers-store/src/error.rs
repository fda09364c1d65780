//! Error types for store operations
//!
//! This module defines the error type shared by the database client, the
//! freshness oracle and the response cache store.

use thiserror::Error;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection error - network or connection pool issues
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query error: {0}")]
    QueryError(String),

    /// The schema registry holds no modification record for the data domain
    #[error("Unknown data domain: {0}")]
    UnknownDomain(String),

    /// Response cache store could not be reached or rejected a command
    #[error("Cache store error: {0}")]
    CacheError(String),

    /// Operation timeout
    #[error("Operation timed out after {timeout_seconds}s: {context}")]
    TimeoutError {
        timeout_seconds: u64,
        context: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Unique constraint violated while writing a row
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// sqlx driver error (wrapper)
    #[error("Database driver error: {0}")]
    DriverError(#[from] sqlx::Error),

    /// redis client error (wrapper)
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}

impl StoreError {
    /// Whether the error means a backing service could not be reached,
    /// as opposed to a logical failure reported by a reachable service.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::ConnectionError(_)
            | StoreError::CacheError(_)
            | StoreError::TimeoutError { .. }
            | StoreError::RedisError(_) => true,
            StoreError::DriverError(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
