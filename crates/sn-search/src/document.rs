//! Document mapping between index documents and Tantivy documents.

use tantivy::schema::Value;
use tantivy::TantivyDocument;

use sn_types::IndexDocument;

use crate::error::SearchError;
use crate::schema::{encode_term, IndexSchema};

/// Convert an index document to a Tantivy document.
///
/// Every indexed field contributes one keyword per value element.
/// Analyzed fields also feed the full-text field.
pub fn to_native_doc(
    schema: &IndexSchema,
    document: &IndexDocument,
) -> Result<TantivyDocument, SearchError> {
    let mut native = TantivyDocument::default();
    let mut text_parts = Vec::new();

    for field in document.fields() {
        if !field.mode.is_indexed() {
            continue;
        }
        let texts = field.value().term_texts();
        for text in &texts {
            native.add_text(schema.terms, encode_term(field.name(), text));
        }
        if field.mode.is_analyzed() {
            text_parts.extend(texts);
        }
    }

    if !text_parts.is_empty() {
        native.add_text(schema.text, text_parts.join(" "));
    }
    native.add_text(schema.source, document.serialize(true)?);

    Ok(native)
}

/// Restore the index document stored in a Tantivy document.
pub fn from_native_doc(
    schema: &IndexSchema,
    native: &TantivyDocument,
) -> Result<IndexDocument, SearchError> {
    let source = native
        .get_first(schema.source)
        .and_then(|v| v.as_str())
        .ok_or_else(|| SearchError::SchemaMismatch("document has no stored source".into()))?;
    Ok(IndexDocument::deserialize(source)?)
}
