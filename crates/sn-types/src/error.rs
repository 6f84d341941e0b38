//! Error types for the index data model.

use thiserror::Error;

/// Errors raised by the index data model.
#[derive(Debug, Error)]
pub enum IndexDataError {
    /// Malformed JSON or flagged text form of a term, field or document.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A typed accessor was called on a field holding another type.
    #[error("Type mismatch on field {field}: expected {expected}, found {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Unparsable version number text
    #[error("Invalid version number: {0}")]
    InvalidVersion(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for IndexDataError {
    fn from(err: serde_json::Error) -> Self {
        IndexDataError::Serialization(err.to_string())
    }
}
