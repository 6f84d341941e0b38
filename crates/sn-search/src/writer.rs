//! Index updater for writing documents to the Tantivy index.
//!
//! The updater wraps the single IndexWriter behind a Mutex. The lock is held
//! only for the duration of one native call. Changes are not visible until
//! `commit` is called and a reader is reloaded.

use std::sync::{Mutex, MutexGuard};

use tantivy::IndexWriter;
use tracing::{debug, info, warn};

use sn_types::{IndexDocument, SnTerm};

use crate::document::to_native_doc;
use crate::error::SearchError;
use crate::index::NativeIndex;
use crate::schema::IndexSchema;

/// Owns the index writer and applies term-keyed document operations.
pub struct IndexUpdater {
    writer: Mutex<Option<IndexWriter>>,
    schema: IndexSchema,
}

impl IndexUpdater {
    /// Create a new updater holding a fresh writer of the index.
    pub fn new(index: &NativeIndex) -> Result<Self, SearchError> {
        let writer = index.writer()?;
        Ok(Self::from_writer(writer, index.schema().clone()))
    }

    /// Create from an existing writer.
    pub fn from_writer(writer: IndexWriter, schema: IndexSchema) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            schema,
        }
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<IndexWriter>>, SearchError> {
        self.writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))
    }

    /// Whether the writer is still open.
    pub fn is_open(&self) -> bool {
        self.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    /// Delete every document matching the term.
    pub fn delete_term(&self, term: &SnTerm) -> Result<(), SearchError> {
        let guard = self.lock()?;
        let writer = guard.as_ref().ok_or(SearchError::WriterClosed)?;
        for native in self.schema.native_terms(term) {
            writer.delete_term(native);
        }
        debug!(term = %term, "Deleted by term");
        Ok(())
    }

    /// Add a document without touching existing ones.
    pub fn add_document(&self, document: &IndexDocument) -> Result<(), SearchError> {
        let native = to_native_doc(&self.schema, document)?;
        let guard = self.lock()?;
        let writer = guard.as_ref().ok_or(SearchError::WriterClosed)?;
        writer.add_document(native)?;
        Ok(())
    }

    /// Replace the documents matching the term with `document`.
    pub fn update_document(
        &self,
        term: &SnTerm,
        document: &IndexDocument,
    ) -> Result<(), SearchError> {
        let native = to_native_doc(&self.schema, document)?;
        let guard = self.lock()?;
        let writer = guard.as_ref().ok_or(SearchError::WriterClosed)?;
        for native_term in self.schema.native_terms(term) {
            writer.delete_term(native_term);
        }
        writer.add_document(native)?;
        debug!(term = %term, "Updated document");
        Ok(())
    }

    /// Delete every document in the index.
    pub fn delete_all(&self) -> Result<(), SearchError> {
        let guard = self.lock()?;
        let writer = guard.as_ref().ok_or(SearchError::WriterClosed)?;
        writer.delete_all_documents()?;
        warn!("Deleted all documents");
        Ok(())
    }

    /// Commit pending changes with `payload` attached to the commit.
    pub fn commit(&self, payload: &str) -> Result<u64, SearchError> {
        let mut guard = self.lock()?;
        let writer = guard.as_mut().ok_or(SearchError::WriterClosed)?;
        let mut prepared = writer.prepare_commit()?;
        prepared.set_payload(payload);
        let opstamp = prepared.commit()?;
        info!(opstamp, "Committed index changes");
        Ok(opstamp)
    }

    /// Rollback uncommitted changes.
    pub fn rollback(&self) -> Result<u64, SearchError> {
        let mut guard = self.lock()?;
        let writer = guard.as_mut().ok_or(SearchError::WriterClosed)?;
        let opstamp = writer.rollback()?;
        warn!(opstamp, "Rolled back index changes");
        Ok(opstamp)
    }

    /// Close the writer, waiting for merges. Uncommitted changes are dropped.
    ///
    /// Closing an already closed updater is a no-op.
    pub fn close(&self) -> Result<(), SearchError> {
        let writer = self.lock()?.take();
        if let Some(writer) = writer {
            writer.wait_merging_threads()?;
            debug!("Closed index writer");
        }
        Ok(())
    }

    /// Replace the writer with a fresh one from `index`, closing the old one first.
    pub fn reopen(&self, index: &NativeIndex) -> Result<(), SearchError> {
        let mut guard = self.lock()?;
        if let Some(old) = guard.take() {
            old.wait_merging_threads()?;
        }
        *guard = Some(index.writer()?);
        debug!("Reopened index writer");
        Ok(())
    }
}
