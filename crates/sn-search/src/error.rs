//! Search error types.

use thiserror::Error;

/// Errors that can occur in the native index layer.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Tantivy index error
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document or payload could not be decoded
    #[error("Index data error: {0}")]
    Data(#[from] sn_types::IndexDataError),

    /// Index not found
    #[error("Index not found at path: {0}")]
    IndexNotFound(String),

    /// Schema mismatch
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Index is locked (another process has it open)
    #[error("Index is locked: {0}")]
    IndexLocked(String),

    /// The writer has been closed
    #[error("Index writer is closed")]
    WriterClosed,
}
