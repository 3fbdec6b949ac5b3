//! Store error types

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a store connection
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or refused the connection
    #[error("store connection failed: {0}")]
    Connect(String),

    /// A statement was rejected while being prepared
    #[error("failed to prepare statement {name}: {reason}")]
    Prepare { name: String, reason: String },

    /// Execution failed (SQL error, broken connection, parameter type mismatch)
    #[error("store query failed: {0}")]
    Query(String),

    /// A returned cell could not be decoded
    #[error("failed to decode column {column}: {reason}")]
    Decode { column: String, reason: String },

    /// The handle was used after it was closed
    #[error("store connection is closed")]
    Closed,
}
