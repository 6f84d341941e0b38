//! # sn-search
//!
//! Native index layer for the content repository indexing engine, built on
//! Tantivy.
//!
//! ## Features
//! - Embedded Tantivy index with MmapDirectory for persistence
//! - Fixed schema carrying schema-less index documents
//! - Delete and update by any field term
//! - Commit payloads carrying the indexing activity status
//! - Exact term lookups over point-in-time snapshots

pub mod document;
pub mod error;
pub mod index;
pub mod schema;
pub mod searcher;
pub mod writer;

pub use document::{from_native_doc, to_native_doc};
pub use error::SearchError;
pub use index::{IndexConfig, NativeIndex};
pub use schema::{build_index_schema, encode_term, IndexSchema};
pub use searcher::IndexSnapshot;
pub use writer::IndexUpdater;
