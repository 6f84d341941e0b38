//! End-to-end test infrastructure for the indexing engine.
//!
//! Provides a shared TestHarness plus a scripted activity queue and an
//! in-memory content tree standing in for the repository.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use sn_indexing::{
    ActivityReplay, BoxError, IndexManager, IndexingError, LocalIndexingEngine,
    TreeDocumentSource, TreeNode,
};
use sn_types::{names, IndexDocument, IndexField, IndexingActivityStatus, IndexingSettings, SnTerm, VersioningInfo};

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub settings: IndexingSettings,
}

impl TestHarness {
    /// Create a new test harness with an index directory in a temp dir.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let mut settings = IndexingSettings::for_directory(temp_dir.path().join("index"));
        settings.indexing_paused_timeout_secs = 1;
        settings.commit_delay_ms = 50;

        Self {
            _temp_dir: temp_dir,
            settings,
        }
    }

    /// A manager over the harness index that is not started yet.
    pub fn manager(&self) -> Arc<IndexManager> {
        Arc::new(IndexManager::new(self.settings.clone()))
    }

    /// A started manager.
    pub fn started_manager(&self) -> Arc<IndexManager> {
        let manager = self.manager();
        manager
            .start(None, &mut io::sink())
            .expect("Failed to start index manager");
        manager
    }

    pub fn engine(&self) -> LocalIndexingEngine {
        LocalIndexingEngine::new(self.settings.clone())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A minimal content document: `Name` and `VersionId`.
pub fn content_document(version_id: i32, name: &str) -> IndexDocument {
    IndexDocument::from_fields(vec![
        IndexField::with_defaults(names::NAME, name),
        IndexField::with_defaults(names::VERSION_ID, version_id),
    ])
}

/// Number of documents of a version visible to a fresh reader.
pub fn count_version(manager: &IndexManager, version_id: i32) -> usize {
    manager
        .get_index_reader_frame(false)
        .expect("Failed to open reader frame")
        .count(&SnTerm::int(names::VERSION_ID, version_id))
        .expect("Failed to count documents")
}

/// What a queued activity does.
#[derive(Debug, Clone)]
pub enum ActivityKind {
    Add(IndexDocument),
    Delete(i32),
}

/// A queued indexing activity.
#[derive(Debug, Clone)]
pub struct Activity {
    pub id: i32,
    pub kind: ActivityKind,
}

impl Activity {
    pub fn add(id: i32, document: IndexDocument) -> Self {
        Self {
            id,
            kind: ActivityKind::Add(document),
        }
    }

    pub fn delete(id: i32, version_id: i32) -> Self {
        Self {
            id,
            kind: ActivityKind::Delete(version_id),
        }
    }

    /// Apply the activity; `false` when the engine skipped it.
    pub fn execute(
        &self,
        manager: &IndexManager,
        executing_unprocessed: bool,
    ) -> Result<bool, IndexingError> {
        match &self.kind {
            ActivityKind::Add(document) => {
                let version_id = document.version_id()?;
                manager.add_document(
                    document.clone(),
                    &VersioningInfo::new(version_id, version_id),
                    executing_unprocessed,
                )
            }
            ActivityKind::Delete(version_id) => manager.delete_document(
                *version_id,
                &VersioningInfo::default().with_delete([*version_id]),
                executing_unprocessed,
            ),
        }
    }
}

/// Scripted activity queue: replays every activity the index has not seen.
#[derive(Default)]
pub struct ScriptedQueue {
    activities: Vec<Activity>,
    replayed: Mutex<Vec<i32>>,
}

impl ScriptedQueue {
    pub fn new(activities: Vec<Activity>) -> Self {
        Self {
            activities,
            replayed: Mutex::new(Vec::new()),
        }
    }

    /// Ids replayed so far, in order.
    pub fn replayed(&self) -> Vec<i32> {
        self.replayed.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ActivityReplay for ScriptedQueue {
    fn replay(
        &self,
        manager: &IndexManager,
        status: &IndexingActivityStatus,
    ) -> Result<(), IndexingError> {
        let mut last_activity_id = status.last_activity_id;
        for activity in &self.activities {
            let unprocessed =
                activity.id > status.last_activity_id || status.gaps.contains(&activity.id);
            if !unprocessed {
                continue;
            }
            activity.execute(manager, true)?;
            last_activity_id = last_activity_id.max(activity.id);
            if let Ok(mut replayed) = self.replayed.lock() {
                replayed.push(activity.id);
            }
        }
        manager.set_activity_status(IndexingActivityStatus::new(last_activity_id, []));
        Ok(())
    }
}

/// In-memory content tree; each node has one version.
#[derive(Default)]
pub struct MemoryTree {
    nodes: Vec<TreeNode>,
    version_ids: HashMap<String, i32>,
    failing: Vec<String>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, path: &str, node_type: &str, version_id: i32) -> Self {
        self.nodes.push(TreeNode::new(path, node_type));
        self.version_ids.insert(path.to_string(), version_id);
        self
    }

    /// Make document composition fail for `path`.
    pub fn failing_at(mut self, path: &str) -> Self {
        self.failing.push(path.to_string());
        self
    }
}

impl TreeDocumentSource for MemoryTree {
    fn load_tree(&self, root_path: &str) -> Result<Vec<TreeNode>, BoxError> {
        let root = root_path.to_lowercase();
        Ok(self
            .nodes
            .iter()
            .filter(|node| {
                let path = node.path.to_lowercase();
                path == root || path.starts_with(&format!("{}/", root))
            })
            .cloned()
            .collect())
    }

    fn compose(&self, node: &TreeNode) -> Result<Vec<IndexDocument>, BoxError> {
        if self.failing.contains(&node.path) {
            return Err(format!("cannot compose document of {}", node.path).into());
        }
        let version_id = self
            .version_ids
            .get(&node.path)
            .copied()
            .ok_or_else(|| format!("unknown node {}", node.path))?;
        let name = node.path.rsplit('/').next().unwrap_or_default();

        let mut document = content_document(version_id, name);
        document.add(IndexField::with_defaults(names::PATH, node.path.as_str()));
        document.add(IndexField::with_defaults(names::NODE_TYPE, node.node_type.as_str()));
        Ok(vec![document])
    }
}
