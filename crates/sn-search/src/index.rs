//! The on-disk native index: open or create, writers, readers and the
//! payload of the last commit.

use std::path::{Path, PathBuf};

use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError};
use tracing::{debug, info};

use crate::error::SearchError;
use crate::schema::{build_index_schema, IndexSchema};

/// Writer memory budget when none is configured.
const DEFAULT_WRITER_MEMORY_MB: usize = 50;

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub index_path: PathBuf,
    pub writer_memory_mb: usize,
}

impl IndexConfig {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }

    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }
}

/// One index directory with its fixed schema.
pub struct NativeIndex {
    index: Index,
    schema: IndexSchema,
    config: IndexConfig,
}

impl NativeIndex {
    /// Open the index directory, creating an empty index when it has none.
    pub fn open_or_create(config: IndexConfig) -> Result<Self, SearchError> {
        let index = open_or_create_index(&config.index_path)?;
        let schema = IndexSchema::from_schema(index.schema())?;

        info!(path = ?config.index_path, "Opened native index");

        Ok(Self {
            index,
            schema,
            config,
        })
    }

    /// Open an existing index, failing when none exists.
    pub fn open(config: IndexConfig) -> Result<Self, SearchError> {
        if !index_exists(&config.index_path) {
            return Err(SearchError::IndexNotFound(
                config.index_path.display().to_string(),
            ));
        }
        Self::open_or_create(config)
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// A writer with the configured memory budget.
    ///
    /// Fails with `IndexLocked` when another writer holds the directory lock.
    pub fn writer(&self) -> Result<IndexWriter, SearchError> {
        let memory_budget = self.config.writer_memory_mb * 1024 * 1024;
        let writer = self.index.writer(memory_budget).map_err(|e| match e {
            TantivyError::LockFailure(lock, _) => {
                SearchError::IndexLocked(format!("{:?}", lock))
            }
            other => SearchError::Tantivy(other),
        })?;
        debug!(
            memory_mb = self.config.writer_memory_mb,
            "Created index writer"
        );
        Ok(writer)
    }

    /// A reader that only moves forward on explicit reload.
    pub fn reader(&self) -> Result<IndexReader, SearchError> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        debug!("Created index reader");
        Ok(reader)
    }

    /// Payload attached to the last commit, if any.
    pub fn commit_payload(&self) -> Result<Option<String>, SearchError> {
        let metas = self.index.load_metas()?;
        Ok(metas.payload)
    }

    pub fn path(&self) -> &Path {
        &self.config.index_path
    }
}

fn index_exists(path: &Path) -> bool {
    path.join("meta.json").exists()
}

fn open_or_create_index(path: &Path) -> Result<Index, SearchError> {
    if index_exists(path) {
        debug!(path = ?path, "Opening existing index");
        return Ok(Index::open_in_dir(path)?);
    }
    info!(path = ?path, "Creating new index");
    std::fs::create_dir_all(path)?;
    let schema = build_index_schema();
    Ok(Index::create_in_dir(path, schema.schema().clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_new_index() {
        let temp_dir = TempDir::new().unwrap();
        let config = IndexConfig::new(temp_dir.path());

        let index = NativeIndex::open_or_create(config).unwrap();
        assert!(index.path().join("meta.json").exists());
        assert_eq!(index.commit_payload().unwrap(), None);
    }

    #[test]
    fn test_open_missing_index() {
        let temp_dir = TempDir::new().unwrap();
        let config = IndexConfig::new(temp_dir.path().join("missing"));

        let err = NativeIndex::open(config).err().unwrap();
        assert!(matches!(err, SearchError::IndexNotFound(_)));
    }

    #[test]
    fn test_commit_payload_persists() {
        let temp_dir = TempDir::new().unwrap();
        let config = IndexConfig::new(temp_dir.path());

        {
            let index = NativeIndex::open_or_create(config.clone()).unwrap();
            let mut writer = index.writer().unwrap();
            let mut prepared = writer.prepare_commit().unwrap();
            prepared.set_payload("{\"LastActivityId\":7,\"Gaps\":[]}");
            prepared.commit().unwrap();
            writer.wait_merging_threads().unwrap();
        }

        let index = NativeIndex::open(config).unwrap();
        assert_eq!(
            index.commit_payload().unwrap().as_deref(),
            Some("{\"LastActivityId\":7,\"Gaps\":[]}")
        );
    }

    #[test]
    fn test_second_writer_is_locked() {
        let temp_dir = TempDir::new().unwrap();
        let index = NativeIndex::open_or_create(IndexConfig::new(temp_dir.path())).unwrap();

        let _writer = index.writer().unwrap();
        let err = index.writer().err().unwrap();
        assert!(matches!(err, SearchError::IndexLocked(_)));
    }

    #[test]
    fn test_reopen_keeps_existing_index() {
        let temp_dir = TempDir::new().unwrap();
        let config = IndexConfig::new(temp_dir.path()).with_memory_mb(20);
        NativeIndex::open_or_create(config.clone()).unwrap();

        let index = NativeIndex::open(config).unwrap();
        assert_eq!(index.path(), temp_dir.path());
        assert_eq!(index.commit_payload().unwrap(), None);
    }
}
