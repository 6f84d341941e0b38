//! Tantivy schema for index documents.
//!
//! Documents are schema-less name/value sets, so every document maps onto
//! the same three native fields:
//! - terms: one raw keyword per indexed field value, `Name\u{1f}value`
//! - text: concatenated analyzed field values
//! - source: the one-line JSON of the whole document

use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};
use tantivy::Term;

use sn_types::SnTerm;

use crate::SearchError;

/// Separates the field name from the value inside a keyword term.
pub const TERM_SEPARATOR: char = '\u{1f}';

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct IndexSchema {
    schema: Schema,
    /// Keyword terms of every indexed field (STRING)
    pub terms: Field,
    /// Full-text content of analyzed fields (TEXT)
    pub text: Field,
    /// Serialized document (STORED)
    pub source: Field,
}

impl IndexSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create an IndexSchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let terms = schema
            .get_field("terms")
            .map_err(|_| SearchError::SchemaMismatch("missing terms field".into()))?;
        let text = schema
            .get_field("text")
            .map_err(|_| SearchError::SchemaMismatch("missing text field".into()))?;
        let source = schema
            .get_field("source")
            .map_err(|_| SearchError::SchemaMismatch("missing source field".into()))?;

        Ok(Self {
            schema,
            terms,
            text,
            source,
        })
    }

    /// Native terms of an index term, one per value element.
    ///
    /// An empty array term has no native terms and matches nothing.
    pub fn native_terms(&self, term: &SnTerm) -> Vec<Term> {
        term.value
            .term_texts()
            .iter()
            .map(|text| Term::from_field_text(self.terms, &encode_term(&term.name, text)))
            .collect()
    }
}

/// Keyword text of one field value.
pub fn encode_term(name: &str, text: &str) -> String {
    let mut encoded = String::with_capacity(name.len() + text.len() + 1);
    encoded.push_str(name);
    encoded.push(TERM_SEPARATOR);
    encoded.push_str(text);
    encoded
}

/// Build the index document schema.
pub fn build_index_schema() -> IndexSchema {
    let mut schema_builder = Schema::builder();

    let terms = schema_builder.add_text_field("terms", STRING);
    let text = schema_builder.add_text_field("text", TEXT);
    let source = schema_builder.add_text_field("source", STORED);

    let schema = schema_builder.build();

    IndexSchema {
        schema,
        terms,
        text,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_schema() {
        let schema = build_index_schema();
        assert!(schema.schema.get_field("terms").is_ok());
        assert!(schema.schema.get_field("text").is_ok());
        assert!(schema.schema.get_field("source").is_ok());
    }

    #[test]
    fn test_from_schema() {
        let original = build_index_schema();
        let rebuilt = IndexSchema::from_schema(original.schema().clone()).unwrap();
        assert_eq!(rebuilt.terms, original.terms);
        assert_eq!(rebuilt.source, original.source);
    }

    #[test]
    fn test_from_foreign_schema() {
        let mut builder = Schema::builder();
        builder.add_text_field("doc_id", STRING);
        let err = IndexSchema::from_schema(builder.build()).unwrap_err();
        assert!(matches!(err, SearchError::SchemaMismatch(_)));
    }

    #[test]
    fn test_native_terms() {
        let schema = build_index_schema();
        let term = SnTerm::int("VersionId", 100);
        let native = schema.native_terms(&term);
        assert_eq!(native.len(), 1);
        assert_eq!(
            native[0],
            Term::from_field_text(schema.terms, "VersionId\u{1f}100")
        );

        let term = SnTerm::string_array("InTree", vec!["/root".into(), "/root/a".into()]);
        assert_eq!(schema.native_terms(&term).len(), 2);

        let term = SnTerm::string_array("InTree", Vec::new());
        assert!(schema.native_terms(&term).is_empty());
    }
}
