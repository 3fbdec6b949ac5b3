//! Query catalog errors

use thiserror::Error;

use crate::store::StoreError;

/// Result type for catalog operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Catalog and execution errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// No statement registered under this name
    #[error("query not found: {0}")]
    NotFound(String),

    /// Bound parameter count differs from the statement's arity
    #[error("query {name} expects {expected} parameter(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A descriptor is malformed (duplicate name, placeholder count mismatch)
    #[error("invalid query descriptor {name}: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// No store handle is available
    #[error("store is disconnected")]
    Disconnected,

    /// The store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    /// Whether the failure came from the store itself
    ///
    /// Only these leave the handle suspect and call for a reconnect;
    /// the rest, undecodable cells included, are authoring errors that a
    /// new handle would not fix.
    pub fn is_store_failure(&self) -> bool {
        match self {
            QueryError::Store(StoreError::Decode { .. }) => false,
            QueryError::Store(_) | QueryError::Disconnected => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failures() {
        assert!(QueryError::Disconnected.is_store_failure());
        assert!(QueryError::Store(StoreError::Closed).is_store_failure());
        assert!(!QueryError::NotFound("x".into()).is_store_failure());
        assert!(!QueryError::ArityMismatch {
            name: "postById".into(),
            expected: 1,
            actual: 0
        }
        .is_store_failure());
    }

    #[test]
    fn test_decode_error_is_not_store_failure() {
        let err = QueryError::Store(StoreError::Decode {
            column: "span".into(),
            reason: "no text form for type point".into(),
        });
        assert!(!err.is_store_failure());
    }

    #[test]
    fn test_arity_message() {
        let err = QueryError::ArityMismatch {
            name: "postById".into(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.to_string(), "query postById expects 1 parameter(s), got 2");
    }
}
