//! # sn-types
//!
//! Index data model for the content repository indexing engine.
//!
//! This crate defines the values exchanged between activity producers and
//! the index manager:
//! - Values, terms and fields: typed index payloads with text and JSON forms
//! - Documents: one indexable content version
//! - Activity status: the durable replay cursor persisted with each commit
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use sn_types::{IndexDocument, IndexField};
//!
//! let mut doc = IndexDocument::new();
//! doc.add(IndexField::with_defaults("VersionId", 100i32));
//! assert_eq!(doc.version_id().unwrap(), 100);
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod field;
pub mod names;
pub mod status;
pub mod value;
pub mod versioning;

pub use config::{IndexingSettings, Settings};
pub use document::{DocumentUpdate, IndexDocument, FORBIDDEN_FIELDS};
pub use error::IndexDataError;
pub use field::{IndexField, IndexStoringMode, IndexTermVector, IndexingMode, SnTerm};
pub use status::IndexingActivityStatus;
pub use value::{IndexValue, IndexValueType};
pub use versioning::{VersionNumber, VersionStatus, VersioningInfo};
