//! Scoped access to the shared writer and reader.
//!
//! Every use of the index writer happens inside an [`IndexWriterFrame`].
//! Non-exclusive frames run concurrently. An exclusive frame waits for all
//! non-exclusive holders to leave and, while waiting or held, keeps new
//! non-exclusive frames out. Frames release on drop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::error;

use sn_search::{IndexSnapshot, IndexUpdater, NativeIndex};
use sn_types::{IndexDocument, SnTerm};

use crate::error::IndexingError;

/// The open native index and its writer.
pub struct IndexStore {
    pub index: NativeIndex,
    pub updater: IndexUpdater,
}

#[derive(Debug, Default)]
struct GateState {
    users: usize,
    exclusive: bool,
    waiting_exclusive: usize,
}

/// Usage accounting for writer frames.
#[derive(Debug, Default)]
pub struct WriterGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl WriterGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until a frame of the requested kind may be held.
    pub fn acquire(&self, exclusive: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if exclusive {
            state.waiting_exclusive += 1;
            state = self
                .changed
                .wait_while(state, |s| s.exclusive || s.users > 0)
                .unwrap_or_else(PoisonError::into_inner);
            state.waiting_exclusive -= 1;
            state.exclusive = true;
        } else {
            state = self
                .changed
                .wait_while(state, |s| s.exclusive || s.waiting_exclusive > 0)
                .unwrap_or_else(PoisonError::into_inner);
            state.users += 1;
        }
    }

    fn release(&self, exclusive: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if exclusive {
            if !state.exclusive {
                error!("Released an exclusive writer frame that was not held");
            }
            state.exclusive = false;
        } else if state.users == 0 {
            error!("Released a writer frame with no users");
        } else {
            state.users -= 1;
        }
        drop(state);
        self.changed.notify_all();
    }

    /// Number of non-exclusive frames currently held.
    pub fn users(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .users
    }

    /// Whether an exclusive frame is currently held.
    pub fn is_exclusive(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .exclusive
    }

    /// Number of exclusive acquisitions waiting for users to leave.
    pub fn waiting_exclusive(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .waiting_exclusive
    }
}

/// A held writer frame.
pub struct IndexWriterFrame<'a> {
    gate: &'a WriterGate,
    exclusive: bool,
    store: Option<Arc<IndexStore>>,
}

impl<'a> IndexWriterFrame<'a> {
    /// Acquire a frame on `gate`; `store` is the index open at that time.
    pub(crate) fn acquire(
        gate: &'a WriterGate,
        exclusive: bool,
        store: impl FnOnce() -> Option<Arc<IndexStore>>,
    ) -> Self {
        gate.acquire(exclusive);
        Self {
            gate,
            exclusive,
            store: store(),
        }
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub(crate) fn store(&self) -> Result<&Arc<IndexStore>, IndexingError> {
        self.store
            .as_ref()
            .ok_or_else(|| IndexingError::InvalidOperation("the index is not open".to_string()))
    }

    /// The index writer.
    pub fn writer(&self) -> Result<&IndexUpdater, IndexingError> {
        Ok(&self.store()?.updater)
    }
}

impl Drop for IndexWriterFrame<'_> {
    fn drop(&mut self) {
        self.gate.release(self.exclusive);
    }
}

/// A held reader frame: a consistent snapshot of the last reopened reader.
pub struct IndexReaderFrame<'a> {
    snapshot: IndexSnapshot,
    active: &'a AtomicUsize,
}

impl<'a> IndexReaderFrame<'a> {
    pub(crate) fn new(snapshot: IndexSnapshot, active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self { snapshot, active }
    }

    pub fn num_docs(&self) -> u64 {
        self.snapshot.num_docs()
    }

    /// Number of documents matching the term.
    pub fn count(&self, term: &SnTerm) -> Result<usize, IndexingError> {
        Ok(self.snapshot.count(term)?)
    }

    /// Stored documents matching the term.
    pub fn documents(&self, term: &SnTerm) -> Result<Vec<IndexDocument>, IndexingError> {
        Ok(self.snapshot.documents(term)?)
    }

    pub fn document_by_version_id(
        &self,
        version_id: i32,
    ) -> Result<Option<IndexDocument>, IndexingError> {
        Ok(self.snapshot.document_by_version_id(version_id)?)
    }
}

impl Drop for IndexReaderFrame<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_shared_frames_run_concurrently() {
        let gate = WriterGate::new();
        let first = IndexWriterFrame::acquire(&gate, false, || None);
        let second = IndexWriterFrame::acquire(&gate, false, || None);
        assert_eq!(gate.users(), 2);

        drop(first);
        drop(second);
        assert_eq!(gate.users(), 0);
    }

    #[test]
    fn test_frame_without_store() {
        let gate = WriterGate::new();
        let frame = IndexWriterFrame::acquire(&gate, false, || None);
        assert!(matches!(
            frame.writer(),
            Err(IndexingError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_exclusive_waits_for_users() {
        let gate = Arc::new(WriterGate::new());
        gate.acquire(false);

        let (tx, rx) = mpsc::channel();
        let handle = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.acquire(true);
                tx.send(()).unwrap();
                gate.release(true);
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(gate.waiting_exclusive(), 1);

        gate.release(false);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert!(!gate.is_exclusive());
    }

    #[test]
    fn test_waiting_exclusive_blocks_new_users() {
        let gate = Arc::new(WriterGate::new());
        gate.acquire(false);

        let exclusive = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.acquire(true);
                thread::sleep(Duration::from_millis(50));
                gate.release(true);
            })
        };
        while gate.waiting_exclusive() == 0 {
            thread::sleep(Duration::from_millis(5));
        }

        let (tx, rx) = mpsc::channel();
        let late_user = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.acquire(false);
                tx.send(()).unwrap();
                gate.release(false);
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        gate.release(false);
        exclusive.join().unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        late_user.join().unwrap();
        assert_eq!(gate.users(), 0);
    }

    #[test]
    fn test_reader_frame_counts_active() {
        let active = AtomicUsize::new(0);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let index =
            NativeIndex::open_or_create(sn_search::IndexConfig::new(temp_dir.path())).unwrap();
        let reader = index.reader().unwrap();

        let frame = IndexReaderFrame::new(
            IndexSnapshot::new(reader.searcher(), index.schema().clone()),
            &active,
        );
        assert_eq!(active.load(Ordering::SeqCst), 1);
        assert_eq!(frame.num_docs(), 0);
        drop(frame);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }
}
