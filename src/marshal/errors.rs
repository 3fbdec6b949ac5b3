//! Marshalling errors

use thiserror::Error;

/// Result type for marshalling
pub type MarshalResult<T> = Result<T, MarshalError>;

/// Row-to-JSON conversion errors
///
/// Conversion is all-or-nothing: any of these fails the whole result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MarshalError {
    /// Two columns of one row normalize to the same key
    #[error("columns {first} and {second} both normalize to key {key}")]
    DuplicateKey {
        key: String,
        first: String,
        second: String,
    },

    /// An integer-typed column holds something that is not an integer
    #[error("column {column} is integer-typed but holds {value:?}")]
    NotAnInteger { column: String, value: String },

    /// The JSON document could not be serialized
    #[error("JSON encoding failed: {0}")]
    Encode(String),
}
