//! The index manager: lifecycle, activity execution and commits.
//!
//! One manager owns one index directory. It holds the single writer and the
//! shared reader, gates writes on the engine state and the pause gate, and
//! persists the [`IndexingActivityStatus`] as the payload of every commit.
//!
//! Lock order: `start_lock`, then `commit_lock`, then writer frames.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tantivy::IndexReader;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use sn_search::{IndexConfig, IndexSchema, IndexSnapshot, IndexUpdater, NativeIndex, SearchError};
use sn_types::names;
use sn_types::status::{GAPS_DISPLAY_GROWTH, GAPS_DISPLAY_MAX_COUNT};
use sn_types::{
    DocumentUpdate, IndexDocument, IndexField, IndexStoringMode, IndexTermVector,
    IndexingActivityStatus, IndexingMode, IndexingSettings, SnTerm, VersionNumber,
    VersioningInfo,
};

use crate::backup::{copy_index_files, BackupGuard, IndexBackupResult};
use crate::commit::{CommitDecision, CommitPolicy};
use crate::error::IndexingError;
use crate::frame::{IndexReaderFrame, IndexStore, IndexWriterFrame, WriterGate};
use crate::gate::PauseGate;
use crate::replay::ActivityReplay;
use crate::tree::TreeDocumentSource;
use crate::worker::CommitWorker;

/// Reader reopen attempts after the first when the writer is closed.
pub const REOPEN_RETRY_MAX: u32 = 2;
pub const REOPEN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    /// The index is open and unprocessed activities are being replayed.
    Starting,
    Running,
    /// Writes block on the pause gate; only dirty reads are allowed.
    Paused,
}

struct ReaderState {
    reader: IndexReader,
    schema: IndexSchema,
    opened_at: Instant,
    opened_at_utc: DateTime<Utc>,
}

impl ReaderState {
    fn new(reader: IndexReader, schema: IndexSchema) -> Self {
        Self {
            reader,
            schema,
            opened_at: Instant::now(),
            opened_at_utc: Utc::now(),
        }
    }

    fn mark_reopened(&mut self) {
        self.opened_at = Instant::now();
        self.opened_at_utc = Utc::now();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn flag_field(name: &str, value: bool) -> IndexField {
    IndexField::new(
        name,
        value,
        IndexingMode::NotAnalyzed,
        IndexStoringMode::Yes,
        IndexTermVector::No,
    )
}

/// Stamp the derived version flags onto a document.
///
/// `IsMajor` and `IsPublic` come from the `Version` field when present;
/// `IsLastPublic` and `IsLastDraft` come from the activity's versioning.
fn stamp_flags(
    document: &mut IndexDocument,
    versioning: &VersioningInfo,
) -> Result<(), IndexingError> {
    let version_id = document.version_id()?;
    if document.has_field(names::VERSION) {
        let version: VersionNumber = document.get_string_value(names::VERSION)?.parse()?;
        document.add(flag_field(names::IS_MAJOR, version.is_major()));
        document.add(flag_field(names::IS_PUBLIC, version.is_public()));
    }
    document.add(flag_field(
        names::IS_LAST_PUBLIC,
        versioning.is_last_public(version_id),
    ));
    document.add(flag_field(
        names::IS_LAST_DRAFT,
        versioning.is_last_draft(version_id),
    ));
    Ok(())
}

pub struct IndexManager {
    settings: IndexingSettings,
    state: Mutex<EngineState>,
    start_lock: Mutex<()>,
    commit_lock: Mutex<()>,
    writer_gate: WriterGate,
    pause_gate: PauseGate,
    store: RwLock<Option<Arc<IndexStore>>>,
    reader: RwLock<Option<ReaderState>>,
    frames_since_reopen: AtomicU64,
    active_reader_frames: AtomicUsize,
    commit_policy: Mutex<CommitPolicy>,
    activity_status: Mutex<IndexingActivityStatus>,
    worker: Mutex<Option<CommitWorker>>,
    backup_guard: BackupGuard,
}

impl IndexManager {
    pub fn new(settings: IndexingSettings) -> Self {
        let commit_policy = CommitPolicy::new(settings.delayed_commit_cycle_max_count);
        Self {
            settings,
            state: Mutex::new(EngineState::Stopped),
            start_lock: Mutex::new(()),
            commit_lock: Mutex::new(()),
            writer_gate: WriterGate::new(),
            pause_gate: PauseGate::new(false),
            store: RwLock::new(None),
            reader: RwLock::new(None),
            frames_since_reopen: AtomicU64::new(0),
            active_reader_frames: AtomicUsize::new(0),
            commit_policy: Mutex::new(commit_policy),
            activity_status: Mutex::new(IndexingActivityStatus::startup()),
            worker: Mutex::new(None),
            backup_guard: BackupGuard::new(),
        }
    }

    pub fn settings(&self) -> &IndexingSettings {
        &self.settings
    }

    fn index_config(&self) -> IndexConfig {
        IndexConfig::new(self.settings.index_path()).with_memory_mb(self.settings.writer_memory_mb)
    }

    pub fn state(&self) -> EngineState {
        *lock(&self.state)
    }

    fn set_state(&self, state: EngineState) {
        *lock(&self.state) = state;
        debug!(?state, "Engine state changed");
    }

    /// Whether the engine is started, paused or not.
    pub fn running(&self) -> bool {
        matches!(self.state(), EngineState::Running | EngineState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.state() == EngineState::Paused
    }

    fn ensure_started(&self) -> Result<(), IndexingError> {
        match self.state() {
            EngineState::Stopped => Err(IndexingError::InvalidOperation(
                "the indexing engine is not started".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn activity_status(&self) -> IndexingActivityStatus {
        lock(&self.activity_status).clone()
    }

    /// Replace the in-memory status. It is persisted by the next commit.
    pub fn set_activity_status(&self, status: IndexingActivityStatus) {
        *lock(&self.activity_status) = status;
    }

    // ---- lifecycle ----

    /// Open the index and bring the engine to Running.
    ///
    /// Concurrent and repeated calls collapse into the first one. When given,
    /// `replay` runs after the index is open and before the engine reports
    /// Running; only operations called with `executing_unprocessed = true`
    /// are executed meanwhile.
    pub fn start(
        self: &Arc<Self>,
        replay: Option<&dyn ActivityReplay>,
        console_out: &mut dyn Write,
    ) -> Result<(), IndexingError> {
        let _start = lock(&self.start_lock);
        if self.state() != EngineState::Stopped {
            debug!("Indexing engine already started");
            return Ok(());
        }

        self.set_state(EngineState::Starting);
        if let Err(e) = self.start_locked(replay, console_out) {
            error!(error = %e, "Indexing engine failed to start");
            self.close_index();
            self.set_state(EngineState::Stopped);
            return Err(e);
        }

        self.set_state(EngineState::Running);
        writeln!(console_out, "Indexing engine started.")?;
        info!(path = %self.settings.index_path().display(), "Indexing engine started");
        Ok(())
    }

    fn start_locked(
        self: &Arc<Self>,
        replay: Option<&dyn ActivityReplay>,
        console_out: &mut dyn Write,
    ) -> Result<(), IndexingError> {
        writeln!(
            console_out,
            "Opening index at {}",
            self.settings.index_path().display()
        )?;
        let status = self.open_index()?;
        writeln!(
            console_out,
            "Index opened. Last activity id: {}, gaps: {}",
            status.last_activity_id,
            IndexingActivityStatus::gaps_to_string(
                &status.gaps,
                GAPS_DISPLAY_MAX_COUNT,
                GAPS_DISPLAY_GROWTH
            )
        )?;

        if let Some(replay) = replay {
            writeln!(console_out, "Executing unprocessed activities.")?;
            replay.replay(self, &status)?;
            self.commit(true)?;
            writeln!(console_out, "Unprocessed activities executed.")?;
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let worker =
                    CommitWorker::spawn(&runtime, Arc::downgrade(self), self.settings.commit_delay());
                *lock(&self.worker) = Some(worker);
            }
            Err(_) => warn!("No async runtime available, commit worker not started"),
        }
        Ok(())
    }

    fn open_index(&self) -> Result<IndexingActivityStatus, IndexingError> {
        let index = NativeIndex::open_or_create(self.index_config())?;
        let status = match index.commit_payload()? {
            Some(payload) if !payload.trim().is_empty() => {
                IndexingActivityStatus::from_json(&payload)?
            }
            _ => IndexingActivityStatus::startup(),
        };
        let updater = IndexUpdater::new(&index)?;
        let reader = ReaderState::new(index.reader()?, index.schema().clone());

        *write(&self.store) = Some(Arc::new(IndexStore { index, updater }));
        *write(&self.reader) = Some(reader);
        self.frames_since_reopen.store(0, Ordering::SeqCst);
        lock(&self.commit_policy).reset();
        self.set_activity_status(status.clone());
        self.pause_gate.open();

        info!(
            last_activity_id = status.last_activity_id,
            gaps = status.gaps.len(),
            "Read indexing activity status"
        );
        Ok(status)
    }

    fn close_index(&self) {
        {
            let _frame = self.acquire_writer(true);
            *write(&self.reader) = None;
            if let Some(store) = write(&self.store).take() {
                if let Err(e) = store.updater.close() {
                    error!(error = %e, "Failed to close index writer");
                }
            }
        }
        self.pause_gate.close();
    }

    /// Block new writes, commit, and wait for in-flight writers to leave.
    pub fn pause_indexing(&self) -> Result<(), IndexingError> {
        let _start = lock(&self.start_lock);
        match self.state() {
            EngineState::Paused => return Ok(()),
            EngineState::Running => {}
            other => {
                return Err(IndexingError::InvalidOperation(format!(
                    "cannot pause indexing in state {:?}",
                    other
                )))
            }
        }

        info!("Pausing indexing");
        self.pause_gate.close();
        if let Err(e) = self.commit(true) {
            self.pause_gate.open();
            return Err(e);
        }

        // Drain: returns once every non-exclusive writer frame is released.
        drop(self.acquire_writer(true));

        self.set_state(EngineState::Paused);
        info!("Indexing paused");
        Ok(())
    }

    /// Resuming a paused engine requires a restart of the process.
    pub fn continue_indexing(&self) -> Result<(), IndexingError> {
        Err(IndexingError::NotSupported(
            "continue indexing is not supported, restart the engine instead".to_string(),
        ))
    }

    /// Stop the worker, commit once more and close the index.
    pub fn shut_down(&self) -> Result<(), IndexingError> {
        let _start = lock(&self.start_lock);
        match self.state() {
            EngineState::Stopped => {
                debug!("Indexing engine already stopped");
                return Ok(());
            }
            EngineState::Paused => {
                return Err(IndexingError::InvalidOperation(
                    "cannot shut down while indexing is paused".to_string(),
                ))
            }
            _ => {}
        }

        info!("Shutting down indexing engine");
        if let Some(worker) = lock(&self.worker).take() {
            worker.stop();
        }

        let result = {
            let _commit = lock(&self.commit_lock);
            let result = self.commit_locked(false);
            self.close_index();
            self.set_state(EngineState::Stopped);
            result
        };

        match &result {
            Ok(()) => info!("Indexing engine stopped"),
            Err(e) => error!(error = %e, "Final commit failed during shutdown"),
        }
        result
    }

    /// Commit, then recreate the writer and the reader from the index directory.
    pub fn restart(&self) -> Result<(), IndexingError> {
        let _start = lock(&self.start_lock);
        let state = self.state();
        if matches!(state, EngineState::Paused | EngineState::Stopped) {
            info!(?state, "Restart skipped");
            return Ok(());
        }

        info!("Restarting index writer and reader");
        let _commit = lock(&self.commit_lock);
        let frame = self.acquire_writer(true);
        let store = frame.store()?;
        let payload = self.activity_status().to_json()?;
        store.updater.commit(&payload)?;
        store.updater.reopen(&store.index)?;

        *write(&self.reader) = Some(ReaderState::new(
            store.index.reader()?,
            store.index.schema().clone(),
        ));
        self.frames_since_reopen.store(0, Ordering::SeqCst);
        lock(&self.commit_policy).reset();
        info!("Index writer and reader restarted");
        Ok(())
    }

    // ---- frames ----

    fn current_store(&self) -> Option<Arc<IndexStore>> {
        read(&self.store).clone()
    }

    fn acquire_writer(&self, exclusive: bool) -> IndexWriterFrame<'_> {
        IndexWriterFrame::acquire(&self.writer_gate, exclusive, || self.current_store())
    }

    /// Acquire a writer frame.
    ///
    /// Non-exclusive frames wait while indexing is paused and fail with
    /// `Timeout` once the configured pause timeout elapses.
    pub fn get_index_writer_frame(
        &self,
        exclusive: bool,
    ) -> Result<IndexWriterFrame<'_>, IndexingError> {
        if !exclusive && !self.pause_gate.wait(self.settings.indexing_paused_timeout()) {
            warn!(
                timeout_secs = self.settings.indexing_paused_timeout_secs,
                "Writer frame timed out behind paused indexing"
            );
            return Err(IndexingError::Timeout(format!(
                "indexing has been paused for more than {} seconds",
                self.settings.indexing_paused_timeout_secs
            )));
        }
        Ok(self.acquire_writer(exclusive))
    }

    /// Acquire a reader frame.
    ///
    /// A clean (`dirty = false`) frame reopens the reader first and is not
    /// available while paused. A dirty frame reuses the current reader unless
    /// it is older than the forced reopen frequency.
    pub fn get_index_reader_frame(
        &self,
        dirty: bool,
    ) -> Result<IndexReaderFrame<'_>, IndexingError> {
        match self.state() {
            EngineState::Stopped => {
                return Err(IndexingError::InvalidOperation(
                    "the indexing engine is not started".to_string(),
                ))
            }
            EngineState::Paused if !dirty => {
                return Err(IndexingError::InvalidOperation(
                    "cannot open a current reader while indexing is paused".to_string(),
                ))
            }
            _ => {}
        }

        let reopen_due = read(&self.reader)
            .as_ref()
            .map(|r| r.opened_at.elapsed() >= self.settings.force_reopen_frequency())
            .unwrap_or(true);
        if !dirty || reopen_due {
            self.reopen_reader()?;
        }

        let snapshot = self.snapshot()?;
        self.frames_since_reopen.fetch_add(1, Ordering::SeqCst);
        Ok(IndexReaderFrame::new(snapshot, &self.active_reader_frames))
    }

    fn snapshot(&self) -> Result<IndexSnapshot, IndexingError> {
        let reader = read(&self.reader);
        let state = reader
            .as_ref()
            .ok_or_else(|| IndexingError::InvalidOperation("the reader is closed".to_string()))?;
        Ok(IndexSnapshot::new(
            state.reader.searcher(),
            state.schema.clone(),
        ))
    }

    /// Reload the reader to the last commit.
    pub fn reopen_reader(&self) -> Result<(), IndexingError> {
        let _frame = self.acquire_writer(false);
        self.reopen_reader_in_frame()
    }

    fn reopen_reader_in_frame(&self) -> Result<(), IndexingError> {
        let mut attempt = 0;
        loop {
            match self.try_reopen_reader() {
                Ok(()) => return Ok(()),
                Err(SearchError::WriterClosed) if attempt < REOPEN_RETRY_MAX => {
                    attempt += 1;
                    warn!(attempt, "Index writer closed while reopening reader, retrying");
                    thread::sleep(REOPEN_RETRY_DELAY);
                }
                Err(SearchError::WriterClosed) => {
                    error!(attempts = attempt + 1, "Could not reopen index reader");
                    return Err(IndexingError::Fatal(format!(
                        "index reader could not be reopened after {} attempts: writer is closed",
                        attempt + 1
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn try_reopen_reader(&self) -> Result<(), SearchError> {
        let store = self
            .current_store()
            .filter(|store| store.updater.is_open())
            .ok_or(SearchError::WriterClosed)?;

        let mut reader = write(&self.reader);
        match reader.as_mut() {
            Some(state) => {
                state.reader.reload()?;
                state.mark_reopened();
            }
            None => {
                *reader = Some(ReaderState::new(
                    store.index.reader()?,
                    store.index.schema().clone(),
                ));
            }
        }
        self.frames_since_reopen.store(0, Ordering::SeqCst);
        debug!("Reopened index reader");
        Ok(())
    }

    /// When the reader was last reopened.
    pub fn index_reopened_at(&self) -> Option<DateTime<Utc>> {
        read(&self.reader).as_ref().map(|r| r.opened_at_utc)
    }

    /// Reader frames handed out since the last reopen.
    pub fn reader_frames_since_reopen(&self) -> u64 {
        self.frames_since_reopen.load(Ordering::SeqCst)
    }

    /// Reader frames currently held.
    pub fn active_reader_frames(&self) -> usize {
        self.active_reader_frames.load(Ordering::SeqCst)
    }

    // ---- commits ----

    /// Commit pending writes with the current activity status as payload.
    pub fn commit(&self, reopen_reader: bool) -> Result<(), IndexingError> {
        let _commit = lock(&self.commit_lock);
        self.commit_locked(reopen_reader)
    }

    fn commit_locked(&self, reopen_reader: bool) -> Result<(), IndexingError> {
        let frame = self.acquire_writer(!reopen_reader);
        let payload = self.activity_status().to_json()?;
        let opstamp = frame.writer()?.commit(&payload)?;
        debug!(opstamp, reopen_reader, "Committed index");

        if reopen_reader {
            self.reopen_reader_in_frame()?;
            lock(&self.commit_policy).reset();
        }
        Ok(())
    }

    /// Commit worker tick.
    pub fn commit_or_delay(&self) -> Result<(), IndexingError> {
        let _commit = lock(&self.commit_lock);
        if !self.running() {
            return Ok(());
        }

        let decision = lock(&self.commit_policy).tick();
        match decision {
            CommitDecision::Idle => Ok(()),
            CommitDecision::Delay => {
                debug!("Commit delayed");
                Ok(())
            }
            CommitDecision::Commit => self.commit_locked(true),
        }
    }

    /// Count a completed write for the commit policy.
    pub fn activity_finished(&self) {
        lock(&self.commit_policy).record_activity();
    }

    // ---- activities ----

    /// Whether an activity may run now.
    ///
    /// Activities run while Running. While Starting only replayed activities
    /// run.
    pub fn is_activity_executable(&self, executing_unprocessed: bool) -> bool {
        match self.state() {
            EngineState::Running => true,
            EngineState::Starting => executing_unprocessed,
            EngineState::Paused | EngineState::Stopped => false,
        }
    }

    /// Stored documents of the versions to reindex, restamped with new flags.
    fn refreshed_documents(
        &self,
        versioning: &VersioningInfo,
    ) -> Result<Vec<IndexDocument>, IndexingError> {
        if versioning.reindex.is_empty() {
            return Ok(Vec::new());
        }
        let snapshot = self.snapshot()?;
        let mut documents = Vec::with_capacity(versioning.reindex.len());
        for version_id in &versioning.reindex {
            match snapshot.document_by_version_id(*version_id)? {
                Some(mut document) => {
                    stamp_flags(&mut document, versioning)?;
                    documents.push(document);
                }
                None => debug!(version_id, "No indexed document to refresh"),
            }
        }
        Ok(documents)
    }

    /// Run one activity: refresh, versioning deletes, then `operation`.
    fn execute_activity<F>(
        &self,
        versioning: Option<&VersioningInfo>,
        executing_unprocessed: bool,
        operation: F,
    ) -> Result<bool, IndexingError>
    where
        F: FnOnce(&IndexUpdater) -> Result<(), IndexingError>,
    {
        if !self.is_activity_executable(executing_unprocessed) {
            debug!(state = ?self.state(), "Activity skipped");
            return Ok(false);
        }

        let refreshed = match versioning {
            Some(versioning) => self.refreshed_documents(versioning)?,
            None => Vec::new(),
        };

        {
            let frame = self.get_index_writer_frame(false)?;
            let writer = frame.writer()?;
            for document in &refreshed {
                writer.update_document(&document.version_id_term()?, document)?;
            }
            if let Some(versioning) = versioning {
                for version_id in &versioning.delete {
                    writer.delete_term(&SnTerm::int(names::VERSION_ID, *version_id))?;
                }
            }
            operation(writer)?;
        }

        self.activity_finished();
        Ok(true)
    }

    /// Index a new version. Any document of the same version is replaced.
    pub fn add_document(
        &self,
        mut document: IndexDocument,
        versioning: &VersioningInfo,
        executing_unprocessed: bool,
    ) -> Result<bool, IndexingError> {
        self.execute_activity(Some(versioning), executing_unprocessed, |writer| {
            stamp_flags(&mut document, versioning)?;
            writer.delete_term(&document.version_id_term()?)?;
            writer.add_document(&document)?;
            debug!(version_id = document.version_id()?, "Added document");
            Ok(())
        })
    }

    /// Index a document that already carries every field, as is.
    pub fn add_complete_document(
        &self,
        document: IndexDocument,
        executing_unprocessed: bool,
    ) -> Result<bool, IndexingError> {
        self.execute_activity(None, executing_unprocessed, |writer| {
            writer.delete_term(&document.version_id_term()?)?;
            writer.add_document(&document)?;
            debug!(version_id = document.version_id()?, "Added complete document");
            Ok(())
        })
    }

    /// Replace the document of a version.
    pub fn update_document(
        &self,
        mut document: IndexDocument,
        versioning: &VersioningInfo,
        executing_unprocessed: bool,
    ) -> Result<bool, IndexingError> {
        self.execute_activity(Some(versioning), executing_unprocessed, |writer| {
            stamp_flags(&mut document, versioning)?;
            writer.update_document(&document.version_id_term()?, &document)?;
            debug!(version_id = document.version_id()?, "Updated document");
            Ok(())
        })
    }

    /// Remove the document of a version.
    pub fn delete_document(
        &self,
        version_id: i32,
        versioning: &VersioningInfo,
        executing_unprocessed: bool,
    ) -> Result<bool, IndexingError> {
        self.execute_activity(Some(versioning), executing_unprocessed, |writer| {
            writer.delete_term(&SnTerm::int(names::VERSION_ID, version_id))?;
            debug!(version_id, "Deleted document");
            Ok(())
        })
    }

    /// Remove every document matching any of the terms.
    pub fn delete_documents(
        &self,
        terms: &[SnTerm],
        versioning: &VersioningInfo,
        executing_unprocessed: bool,
    ) -> Result<bool, IndexingError> {
        self.execute_activity(Some(versioning), executing_unprocessed, |writer| {
            for term in terms {
                writer.delete_term(term)?;
            }
            debug!(terms = terms.len(), "Deleted documents");
            Ok(())
        })
    }

    /// Index a whole subtree.
    ///
    /// Every document is composed before anything is written; one composition
    /// failure fails the call and leaves the index untouched. When replaying,
    /// the old subtree is removed first.
    pub fn add_tree(
        &self,
        root_path: &str,
        source: &dyn TreeDocumentSource,
        executing_unprocessed: bool,
    ) -> Result<bool, IndexingError> {
        if !self.is_activity_executable(executing_unprocessed) {
            debug!(root_path, state = ?self.state(), "Tree indexing skipped");
            return Ok(false);
        }

        let documents = self.compose_tree(root_path, source)?;
        self.execute_activity(None, executing_unprocessed, |writer| {
            if executing_unprocessed {
                writer.delete_term(&SnTerm::string(
                    names::IN_TREE,
                    names::normalize_path(root_path),
                ))?;
                writer.delete_term(&SnTerm::string(names::PATH, root_path))?;
            }
            for document in &documents {
                writer.delete_term(&document.version_id_term()?)?;
                writer.add_document(document)?;
            }
            info!(root_path, documents = documents.len(), "Indexed tree");
            Ok(())
        })
    }

    fn compose_tree(
        &self,
        root_path: &str,
        source: &dyn TreeDocumentSource,
    ) -> Result<Vec<IndexDocument>, IndexingError> {
        let nodes = source
            .load_tree(root_path)
            .map_err(|source| IndexingError::Composition {
                path: root_path.to_string(),
                source,
            })?;

        let mut documents = Vec::new();
        for node in nodes {
            if self.settings.is_excluded_node_type(&node.node_type) {
                debug!(path = %node.path, node_type = %node.node_type, "Excluded from tree indexing");
                continue;
            }
            let composed = source.compose(&node).map_err(|e| {
                error!(path = %node.path, error = %e, "Document composition failed");
                IndexingError::Composition {
                    path: node.path.clone(),
                    source: e,
                }
            })?;
            for mut document in composed {
                if !document.has_field(names::IN_TREE) {
                    let path = document.get_string_value(names::PATH)?;
                    if !path.is_empty() {
                        document.add(IndexField::new(
                            names::IN_TREE,
                            names::in_tree_values(&path),
                            IndexingMode::NotAnalyzed,
                            IndexStoringMode::Yes,
                            IndexTermVector::No,
                        ));
                    }
                }
                documents.push(document);
            }
        }
        Ok(documents)
    }

    // ---- administration ----

    /// Remove every document and reset the activity status.
    pub fn clear_index(&self) -> Result<(), IndexingError> {
        self.ensure_started()?;
        {
            let frame = self.get_index_writer_frame(false)?;
            frame.writer()?.delete_all()?;
        }
        self.set_activity_status(IndexingActivityStatus::startup());
        self.commit(true)?;
        info!("Index cleared");
        Ok(())
    }

    /// The status persisted with the last commit.
    ///
    /// Works without starting the engine; a missing index yields the
    /// startup status.
    pub fn read_activity_status_from_index(
        &self,
    ) -> Result<IndexingActivityStatus, IndexingError> {
        let payload = match self.current_store() {
            Some(store) => store.index.commit_payload()?,
            None => match NativeIndex::open(self.index_config()) {
                Ok(index) => index.commit_payload()?,
                Err(SearchError::IndexNotFound(path)) => {
                    debug!(path, "No index found, using startup status");
                    None
                }
                Err(e) => return Err(e.into()),
            },
        };
        match payload {
            Some(payload) if !payload.trim().is_empty() => {
                Ok(IndexingActivityStatus::from_json(&payload)?)
            }
            _ => Ok(IndexingActivityStatus::startup()),
        }
    }

    /// Set the status and persist it with a commit.
    pub fn write_activity_status_to_index(
        &self,
        status: IndexingActivityStatus,
    ) -> Result<(), IndexingError> {
        self.ensure_started()?;
        self.set_activity_status(status);
        self.commit(true)
    }

    /// Apply raw deletions, updates and additions inside one writer frame.
    pub fn write_index(
        &self,
        deletions: &[SnTerm],
        updates: &[DocumentUpdate],
        additions: &[IndexDocument],
    ) -> Result<(), IndexingError> {
        self.ensure_started()?;
        {
            let frame = self.get_index_writer_frame(false)?;
            let writer = frame.writer()?;
            for term in deletions {
                writer.delete_term(term)?;
            }
            for update in updates {
                writer.update_document(&update.update_term, &update.document)?;
            }
            for document in additions {
                writer.add_document(document)?;
            }
        }
        self.activity_finished();
        debug!(
            deletions = deletions.len(),
            updates = updates.len(),
            additions = additions.len(),
            "Wrote index changes"
        );
        Ok(())
    }

    /// Commit and copy the index files into `target`.
    ///
    /// Writes wait until the copy is finished.
    pub fn backup(&self, target: &Path) -> Result<IndexBackupResult, IndexingError> {
        let Some(_run) = self.backup_guard.try_acquire() else {
            info!("Index backup already executing");
            return Ok(IndexBackupResult::AlreadyExecuting);
        };
        self.ensure_started()?;

        info!(target = %target.display(), "Starting index backup");
        let _commit = lock(&self.commit_lock);
        self.commit_locked(true)?;

        let frame = self.acquire_writer(true);
        let store = frame.store()?;
        let copied = copy_index_files(store.index.path(), target)?;
        info!(copied, target = %target.display(), "Index backup finished");
        Ok(IndexBackupResult::Finished)
    }

    pub fn is_backup_running(&self) -> bool {
        self.backup_guard.is_running()
    }
}

impl Drop for IndexManager {
    fn drop(&mut self) {
        if let Some(worker) = lock(&self.worker).take() {
            worker.stop();
        }
    }
}
