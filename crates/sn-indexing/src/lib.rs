//! # sn-indexing
//!
//! The indexing activity engine of the content repository.
//!
//! [`IndexManager`] owns one native index with a single writer and a shared,
//! periodically reopened reader. Activities are applied as ordered
//! delete/update/add operations inside writer frames; a background
//! [`CommitWorker`] batches commits and each commit persists the
//! [`IndexingActivityStatus`](sn_types::IndexingActivityStatus) so unprocessed
//! activities can be replayed after a crash.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sn_indexing::IndexManager;
//! use sn_types::{IndexDocument, IndexField, IndexingSettings, VersioningInfo};
//!
//! let manager = Arc::new(IndexManager::new(IndexingSettings::for_directory("/tmp/sn-index")));
//! manager.start(None, &mut std::io::stdout()).unwrap();
//!
//! let doc = IndexDocument::from_fields(vec![
//!     IndexField::with_defaults("VersionId", 100i32),
//!     IndexField::with_defaults("Name", "Foo"),
//! ]);
//! manager.add_document(doc, &VersioningInfo::new(100, 100), false).unwrap();
//! manager.commit(true).unwrap();
//! ```

pub mod backup;
pub mod commit;
pub mod engine;
pub mod error;
pub mod frame;
pub mod gate;
pub mod manager;
pub mod replay;
pub mod tree;
pub mod worker;

pub use backup::IndexBackupResult;
pub use commit::{CommitDecision, CommitPolicy};
pub use engine::{IndexingEngine, LocalIndexingEngine};
pub use error::{BoxError, IndexingError};
pub use frame::{IndexReaderFrame, IndexWriterFrame};
pub use gate::PauseGate;
pub use manager::{EngineState, IndexManager, REOPEN_RETRY_MAX};
pub use replay::ActivityReplay;
pub use tree::{TreeDocumentSource, TreeNode};
pub use worker::CommitWorker;
