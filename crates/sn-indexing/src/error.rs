//! Error types for the indexing engine.

use sn_search::SearchError;
use sn_types::IndexDataError;
use thiserror::Error;

/// Boxed error returned by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in the indexing engine
#[derive(Error, Debug)]
pub enum IndexingError {
    /// A write waited behind a paused engine longer than the configured timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The call is not valid in the current engine state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The index or the engine's bookkeeping is in an unusable state
    #[error("Fatal indexing error: {0}")]
    Fatal(String),

    /// Building a document for a tree node failed
    #[error("Document composition failed for {path}: {source}")]
    Composition {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Operation cancelled")]
    Cancelled,

    /// Native index error
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Index data model error
    #[error("Data error: {0}")]
    Data(#[from] IndexDataError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexingError {
    /// Whether the error is the pause-gate timeout, which can be retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexingError::Timeout(_))
    }
}
