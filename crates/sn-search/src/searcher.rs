//! Term lookups over a consistent index snapshot.
//!
//! There is no query language: documents are found by exact term only.

use tantivy::collector::{Count, DocSetCollector};
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Searcher, TantivyDocument};
use tracing::debug;

use sn_types::{names, IndexDocument, SnTerm};

use crate::document::from_native_doc;
use crate::error::SearchError;
use crate::schema::IndexSchema;

/// A point-in-time view of the index.
#[derive(Clone)]
pub struct IndexSnapshot {
    searcher: Searcher,
    schema: IndexSchema,
}

impl IndexSnapshot {
    pub fn new(searcher: Searcher, schema: IndexSchema) -> Self {
        Self { searcher, schema }
    }

    /// Number of live documents in the snapshot.
    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }

    /// Number of documents matching the term.
    pub fn count(&self, term: &SnTerm) -> Result<usize, SearchError> {
        let Some(query) = self.term_query(term) else {
            return Ok(0);
        };
        let count = self.searcher.search(&query, &Count)?;
        debug!(term = %term, count, "Counted term");
        Ok(count)
    }

    /// Stored documents matching the term, in index order.
    pub fn documents(&self, term: &SnTerm) -> Result<Vec<IndexDocument>, SearchError> {
        let Some(query) = self.term_query(term) else {
            return Ok(Vec::new());
        };
        let mut addresses: Vec<_> = self
            .searcher
            .search(&query, &DocSetCollector)?
            .into_iter()
            .collect();
        addresses.sort_by_key(|a| (a.segment_ord, a.doc_id));

        let mut documents = Vec::with_capacity(addresses.len());
        for address in addresses {
            let native: TantivyDocument = self.searcher.doc(address)?;
            documents.push(from_native_doc(&self.schema, &native)?);
        }
        Ok(documents)
    }

    /// The stored document of a version, if indexed.
    pub fn document_by_version_id(
        &self,
        version_id: i32,
    ) -> Result<Option<IndexDocument>, SearchError> {
        let term = SnTerm::int(names::VERSION_ID, version_id);
        Ok(self.documents(&term)?.into_iter().next())
    }

    fn term_query(&self, term: &SnTerm) -> Option<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = self
            .schema
            .native_terms(term)
            .into_iter()
            .map(|native| {
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(native, IndexRecordOption::Basic));
                (Occur::Should, query)
            })
            .collect();

        match clauses.len() {
            0 => None,
            1 => clauses.pop().map(|(_, query)| query),
            _ => Some(Box::new(BooleanQuery::new(clauses))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexConfig, NativeIndex};
    use crate::writer::IndexUpdater;
    use sn_types::{IndexField, IndexingMode, IndexStoringMode, IndexTermVector};
    use tempfile::TempDir;

    fn document(version_id: i32, path: &str) -> IndexDocument {
        IndexDocument::from_fields(vec![
            IndexField::with_defaults("VersionId", version_id),
            IndexField::with_defaults("Path", path),
            IndexField::with_defaults("InTree", names::in_tree_values(path)),
            IndexField::with_defaults("IsPublic", version_id % 2 == 0),
            IndexField::new(
                "Password",
                "never",
                IndexingMode::Analyzed,
                IndexStoringMode::Yes,
                IndexTermVector::Default,
            ),
        ])
    }

    fn setup_index() -> (TempDir, NativeIndex) {
        let temp_dir = TempDir::new().unwrap();
        let index = NativeIndex::open_or_create(IndexConfig::new(temp_dir.path())).unwrap();
        let updater = IndexUpdater::new(&index).unwrap();
        updater.add_document(&document(1, "/Root/A")).unwrap();
        updater.add_document(&document(2, "/Root/A/x")).unwrap();
        updater.add_document(&document(3, "/Root/B")).unwrap();
        updater.commit("{}").unwrap();
        updater.close().unwrap();
        (temp_dir, index)
    }

    fn snapshot(index: &NativeIndex) -> IndexSnapshot {
        IndexSnapshot::new(index.reader().unwrap().searcher(), index.schema().clone())
    }

    #[test]
    fn test_count_by_term() {
        let (_dir, index) = setup_index();
        let snapshot = snapshot(&index);

        assert_eq!(snapshot.num_docs(), 3);
        assert_eq!(snapshot.count(&SnTerm::int("VersionId", 2)).unwrap(), 1);
        assert_eq!(snapshot.count(&SnTerm::int("VersionId", 9)).unwrap(), 0);
        assert_eq!(snapshot.count(&SnTerm::string("InTree", "/root/a")).unwrap(), 2);
        assert_eq!(snapshot.count(&SnTerm::bool("IsPublic", true)).unwrap(), 1);
        assert_eq!(snapshot.count(&SnTerm::string("Password", "never")).unwrap(), 0);
    }

    #[test]
    fn test_count_by_array_term_matches_any() {
        let (_dir, index) = setup_index();
        let snapshot = snapshot(&index);

        let term = SnTerm::int_array("VersionId", vec![1, 3]);
        assert_eq!(snapshot.count(&term).unwrap(), 2);
        assert_eq!(snapshot.count(&SnTerm::int_array("VersionId", vec![])).unwrap(), 0);
    }

    #[test]
    fn test_documents_by_term() {
        let (_dir, index) = setup_index();
        let snapshot = snapshot(&index);

        let docs = snapshot.documents(&SnTerm::string("InTree", "/root/a")).unwrap();
        let mut ids: Vec<i32> = docs.iter().map(|d| d.version_id().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
        assert!(docs.iter().all(|d| !d.has_field("Password")));
    }

    #[test]
    fn test_document_by_version_id() {
        let (_dir, index) = setup_index();
        let snapshot = snapshot(&index);

        let doc = snapshot.document_by_version_id(3).unwrap().unwrap();
        assert_eq!(doc.get_string_value("Path").unwrap(), "/Root/B");
        assert!(snapshot.document_by_version_id(42).unwrap().is_none());
    }
}
