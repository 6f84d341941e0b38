//! Async contract of the indexing engine and its in-process implementation.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sn_types::{DocumentUpdate, IndexDocument, IndexingActivityStatus, IndexingSettings, SnTerm};

use crate::backup::IndexBackupResult;
use crate::error::IndexingError;
use crate::manager::IndexManager;
use crate::replay::ActivityReplay;

/// Operations the content repository calls on its index.
///
/// A token that is already cancelled when a call starts fails the call with
/// [`IndexingError::Cancelled`]; a started call runs to completion.
#[async_trait]
pub trait IndexingEngine: Send + Sync {
    /// Whether the engine is started.
    fn running(&self) -> bool;

    async fn start(
        &self,
        console_out: Box<dyn Write + Send>,
        cancel: &CancellationToken,
    ) -> Result<(), IndexingError>;

    async fn shut_down(&self, cancel: &CancellationToken) -> Result<(), IndexingError>;

    /// Back up into a new timestamped directory under the backup directory.
    async fn backup(&self, cancel: &CancellationToken)
        -> Result<IndexBackupResult, IndexingError>;

    async fn backup_to(
        &self,
        target: PathBuf,
        cancel: &CancellationToken,
    ) -> Result<IndexBackupResult, IndexingError>;

    async fn clear_index(&self, cancel: &CancellationToken) -> Result<(), IndexingError>;

    async fn read_activity_status_from_index(
        &self,
        cancel: &CancellationToken,
    ) -> Result<IndexingActivityStatus, IndexingError>;

    async fn write_activity_status_to_index(
        &self,
        status: IndexingActivityStatus,
        cancel: &CancellationToken,
    ) -> Result<(), IndexingError>;

    /// Apply deletions, then updates, then additions.
    async fn write_index(
        &self,
        deletions: Vec<SnTerm>,
        updates: Vec<DocumentUpdate>,
        additions: Vec<IndexDocument>,
        cancel: &CancellationToken,
    ) -> Result<(), IndexingError>;
}

/// [`IndexingEngine`] over an in-process [`IndexManager`].
pub struct LocalIndexingEngine {
    manager: Arc<IndexManager>,
    replay: Option<Arc<dyn ActivityReplay>>,
}

impl LocalIndexingEngine {
    pub fn new(settings: IndexingSettings) -> Self {
        Self::from_manager(Arc::new(IndexManager::new(settings)))
    }

    pub fn from_manager(manager: Arc<IndexManager>) -> Self {
        Self {
            manager,
            replay: None,
        }
    }

    /// Replay hook run on every start.
    pub fn with_replay(mut self, replay: Arc<dyn ActivityReplay>) -> Self {
        self.replay = Some(replay);
        self
    }

    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    async fn run_blocking<T, F>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<T, IndexingError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<IndexManager>) -> Result<T, IndexingError> + Send + 'static,
    {
        if cancel.is_cancelled() {
            debug!(operation, "Indexing call cancelled before start");
            return Err(IndexingError::Cancelled);
        }
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || f(manager))
            .await
            .map_err(|e| IndexingError::Fatal(format!("{} task failed: {}", operation, e)))?
    }
}

#[async_trait]
impl IndexingEngine for LocalIndexingEngine {
    fn running(&self) -> bool {
        self.manager.running()
    }

    async fn start(
        &self,
        console_out: Box<dyn Write + Send>,
        cancel: &CancellationToken,
    ) -> Result<(), IndexingError> {
        let replay = self.replay.clone();
        self.run_blocking("start", cancel, move |manager| {
            let mut console_out = console_out;
            manager.start(replay.as_deref(), &mut console_out)
        })
        .await
    }

    async fn shut_down(&self, cancel: &CancellationToken) -> Result<(), IndexingError> {
        self.run_blocking("shut_down", cancel, |manager| manager.shut_down())
            .await
    }

    async fn backup(
        &self,
        cancel: &CancellationToken,
    ) -> Result<IndexBackupResult, IndexingError> {
        let target = self
            .manager
            .settings()
            .backup_path()
            .join(Utc::now().format("%Y%m%d%H%M%S%3f").to_string());
        self.backup_to(target, cancel).await
    }

    async fn backup_to(
        &self,
        target: PathBuf,
        cancel: &CancellationToken,
    ) -> Result<IndexBackupResult, IndexingError> {
        self.run_blocking("backup", cancel, move |manager| manager.backup(&target))
            .await
    }

    async fn clear_index(&self, cancel: &CancellationToken) -> Result<(), IndexingError> {
        self.run_blocking("clear_index", cancel, |manager| manager.clear_index())
            .await
    }

    async fn read_activity_status_from_index(
        &self,
        cancel: &CancellationToken,
    ) -> Result<IndexingActivityStatus, IndexingError> {
        self.run_blocking("read_activity_status", cancel, |manager| {
            manager.read_activity_status_from_index()
        })
        .await
    }

    async fn write_activity_status_to_index(
        &self,
        status: IndexingActivityStatus,
        cancel: &CancellationToken,
    ) -> Result<(), IndexingError> {
        self.run_blocking("write_activity_status", cancel, move |manager| {
            manager.write_activity_status_to_index(status)
        })
        .await
    }

    async fn write_index(
        &self,
        deletions: Vec<SnTerm>,
        updates: Vec<DocumentUpdate>,
        additions: Vec<IndexDocument>,
        cancel: &CancellationToken,
    ) -> Result<(), IndexingError> {
        self.run_blocking("write_index", cancel, move |manager| {
            manager.write_index(&deletions, &updates, &additions)
        })
        .await
    }
}
