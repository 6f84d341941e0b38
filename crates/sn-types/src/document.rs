//! Indexable documents.
//!
//! An [`IndexDocument`] is the unit written to the index: one content
//! version, held as a name-ordered set of [`IndexField`]s.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IndexDataError;
use crate::field::{IndexField, SnTerm};
use crate::names;
use crate::value::{IndexValue, IndexValueType};

/// Field names that never enter the index.
pub const FORBIDDEN_FIELDS: [&str; 2] = ["Password", "PasswordHash"];

/// A name-keyed, name-ordered collection of index fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexDocument {
    fields: BTreeMap<String, IndexField>,
}

impl IndexDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from fields; later fields replace earlier ones.
    pub fn from_fields(fields: impl IntoIterator<Item = IndexField>) -> Self {
        let mut doc = Self::new();
        for field in fields {
            doc.add(field);
        }
        doc
    }

    /// Insert or replace a field. Forbidden names are dropped silently.
    pub fn add(&mut self, field: IndexField) {
        if FORBIDDEN_FIELDS.contains(&field.name()) {
            return;
        }
        self.fields.insert(field.name().to_string(), field);
    }

    pub fn remove(&mut self, name: &str) -> Option<IndexField> {
        self.fields.remove(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&IndexField> {
        self.fields.get(name)
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = &IndexField> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get_string_value(&self, name: &str) -> Result<String, IndexDataError> {
        match self.value(name) {
            None => Ok(String::new()),
            Some(IndexValue::String(s)) => Ok(s.clone()),
            Some(IndexValue::StringArray(items)) => Ok(items.first().cloned().unwrap_or_default()),
            Some(other) => Err(mismatch(name, IndexValueType::String, other)),
        }
    }

    pub fn get_string_array_value(&self, name: &str) -> Result<Vec<String>, IndexDataError> {
        match self.value(name) {
            None => Ok(Vec::new()),
            Some(IndexValue::StringArray(items)) => Ok(items.clone()),
            Some(IndexValue::String(s)) => Ok(vec![s.clone()]),
            Some(other) => Err(mismatch(name, IndexValueType::StringArray, other)),
        }
    }

    pub fn get_boolean_value(&self, name: &str) -> Result<bool, IndexDataError> {
        match self.value(name) {
            None => Ok(false),
            Some(IndexValue::Bool(b)) => Ok(*b),
            Some(other) => Err(mismatch(name, IndexValueType::Bool, other)),
        }
    }

    pub fn get_integer_value(&self, name: &str) -> Result<i32, IndexDataError> {
        match self.value(name) {
            None => Ok(0),
            Some(IndexValue::Int(i)) => Ok(*i),
            Some(IndexValue::IntArray(items)) => Ok(items.first().copied().unwrap_or_default()),
            Some(other) => Err(mismatch(name, IndexValueType::Int, other)),
        }
    }

    pub fn get_integer_array_value(&self, name: &str) -> Result<Vec<i32>, IndexDataError> {
        match self.value(name) {
            None => Ok(Vec::new()),
            Some(IndexValue::IntArray(items)) => Ok(items.clone()),
            Some(IndexValue::Int(i)) => Ok(vec![*i]),
            Some(other) => Err(mismatch(name, IndexValueType::IntArray, other)),
        }
    }

    pub fn get_long_value(&self, name: &str) -> Result<i64, IndexDataError> {
        match self.value(name) {
            None => Ok(0),
            Some(IndexValue::Long(l)) => Ok(*l),
            Some(other) => Err(mismatch(name, IndexValueType::Long, other)),
        }
    }

    pub fn get_single_value(&self, name: &str) -> Result<f32, IndexDataError> {
        match self.value(name) {
            None => Ok(0.0),
            Some(IndexValue::Float(f)) => Ok(*f),
            Some(other) => Err(mismatch(name, IndexValueType::Float, other)),
        }
    }

    pub fn get_double_value(&self, name: &str) -> Result<f64, IndexDataError> {
        match self.value(name) {
            None => Ok(0.0),
            Some(IndexValue::Double(d)) => Ok(*d),
            Some(other) => Err(mismatch(name, IndexValueType::Double, other)),
        }
    }

    pub fn get_date_time_value(&self, name: &str) -> Result<DateTime<Utc>, IndexDataError> {
        match self.value(name) {
            None => Ok(DateTime::<Utc>::default()),
            Some(IndexValue::DateTime(dt)) => Ok(*dt),
            Some(other) => Err(mismatch(name, IndexValueType::DateTime, other)),
        }
    }

    /// The `VersionId` of this document, 0 when absent.
    pub fn version_id(&self) -> Result<i32, IndexDataError> {
        self.get_integer_value(names::VERSION_ID)
    }

    /// The `VersionId` term that identifies this document in the index.
    pub fn version_id_term(&self) -> Result<SnTerm, IndexDataError> {
        Ok(SnTerm::int(names::VERSION_ID, self.version_id()?))
    }

    /// JSON array of field objects; indented unless `one_line`.
    pub fn serialize(&self, one_line: bool) -> Result<String, IndexDataError> {
        let text = if one_line {
            serde_json::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        Ok(text)
    }

    pub fn deserialize(text: &str) -> Result<Self, IndexDataError> {
        serde_json::from_str(text)
            .map_err(|e| IndexDataError::Serialization(format!("invalid index document: {}", e)))
    }

    fn value(&self, name: &str) -> Option<&IndexValue> {
        self.fields.get(name).map(IndexField::value)
    }
}

fn mismatch(name: &str, expected: IndexValueType, actual: &IndexValue) -> IndexDataError {
    IndexDataError::TypeMismatch {
        field: name.to_string(),
        expected: expected.as_str(),
        actual: actual.value_type().as_str(),
    }
}

impl Serialize for IndexDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.fields.values())
    }
}

impl<'de> Deserialize<'de> for IndexDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Vec::<IndexField>::deserialize(deserializer)?;
        Ok(IndexDocument::from_fields(fields))
    }
}

impl FromIterator<IndexField> for IndexDocument {
    fn from_iter<T: IntoIterator<Item = IndexField>>(iter: T) -> Self {
        IndexDocument::from_fields(iter)
    }
}

/// Replace the document identified by `update_term` with `document`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(rename = "UpdateTerm")]
    pub update_term: SnTerm,
    #[serde(rename = "Document")]
    pub document: IndexDocument,
}

impl DocumentUpdate {
    pub fn new(update_term: SnTerm, document: IndexDocument) -> Self {
        Self {
            update_term,
            document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{IndexStoringMode, IndexTermVector, IndexingMode};
    use chrono::TimeZone;

    fn sample_document() -> IndexDocument {
        let dt = Utc.with_ymd_and_hms(2023, 11, 5, 8, 15, 30).unwrap()
            + chrono::Duration::milliseconds(250);
        IndexDocument::from_fields(vec![
            IndexField::with_defaults("Name", "Foo"),
            IndexField::new(
                "Keywords",
                vec!["alpha".to_string(), "beta, gamma".to_string()],
                IndexingMode::Analyzed,
                IndexStoringMode::Yes,
                IndexTermVector::WithPositionsOffsets,
            ),
            IndexField::new(
                "Hidden",
                true,
                IndexingMode::NotAnalyzedNoNorms,
                IndexStoringMode::No,
                IndexTermVector::No,
            ),
            IndexField::with_defaults("VersionId", 100i32),
            IndexField::new(
                "Ids",
                vec![1i32, 2, 3],
                IndexingMode::No,
                IndexStoringMode::Default,
                IndexTermVector::Default,
            ),
            IndexField::with_defaults("Size", 1_234_567_890_123i64),
            IndexField::new(
                "Rating",
                3.7f32,
                IndexingMode::AnalyzedNoNorms,
                IndexStoringMode::Yes,
                IndexTermVector::WithOffsets,
            ),
            IndexField::with_defaults("Score", 0.1f64),
            IndexField::new(
                "ModificationDate",
                dt,
                IndexingMode::NotAnalyzed,
                IndexStoringMode::Yes,
                IndexTermVector::Yes,
            ),
        ])
    }

    #[test]
    fn test_forbidden_fields_are_dropped() {
        let mut doc = IndexDocument::new();
        doc.add(IndexField::with_defaults("PasswordHash", "abc"));
        doc.add(IndexField::with_defaults("Name", "Foo"));
        doc.add(IndexField::with_defaults("Password", "secret"));

        assert!(!doc.has_field("Password"));
        assert!(!doc.has_field("PasswordHash"));
        assert!(doc.has_field("Name"));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_forbidden_fields_dropped_on_deserialize() {
        let json = r#"[{"Name":"Password","Type":"String","Value":"x"},{"Name":"Name","Type":"String","Value":"Foo"}]"#;
        let doc = IndexDocument::deserialize(json).unwrap();
        assert!(!doc.has_field("Password"));
        assert_eq!(doc.get_string_value("Name").unwrap(), "Foo");
    }

    #[test]
    fn test_add_replaces_by_name() {
        let mut doc = IndexDocument::new();
        doc.add(IndexField::with_defaults("Name", "First"));
        doc.add(IndexField::with_defaults("Name", "Second"));
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get_string_value("Name").unwrap(), "Second");

        assert!(doc.remove("Name").is_some());
        assert!(doc.is_empty());
    }

    #[test]
    fn test_typed_accessors_defaults() {
        let doc = IndexDocument::new();
        assert_eq!(doc.get_string_value("X").unwrap(), "");
        assert!(doc.get_string_array_value("X").unwrap().is_empty());
        assert!(!doc.get_boolean_value("X").unwrap());
        assert_eq!(doc.get_integer_value("X").unwrap(), 0);
        assert_eq!(doc.get_long_value("X").unwrap(), 0);
        assert_eq!(doc.get_single_value("X").unwrap(), 0.0);
        assert_eq!(doc.get_double_value("X").unwrap(), 0.0);
        assert_eq!(doc.get_date_time_value("X").unwrap(), DateTime::<Utc>::default());
        assert_eq!(doc.version_id().unwrap(), 0);
    }

    #[test]
    fn test_typed_accessors_mismatch() {
        let doc = sample_document();
        let err = doc.get_integer_value("Name").unwrap_err();
        match err {
            IndexDataError::TypeMismatch {
                field,
                expected,
                actual,
            } => {
                assert_eq!(field, "Name");
                assert_eq!(expected, "Int");
                assert_eq!(actual, "String");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(doc.get_long_value("VersionId").is_err());
        assert!(doc.get_double_value("Rating").is_err());
        assert!(doc.get_boolean_value("Name").is_err());
    }

    #[test]
    fn test_single_array_leniency() {
        let doc = sample_document();
        assert_eq!(doc.get_string_value("Keywords").unwrap(), "alpha");
        assert_eq!(doc.get_string_array_value("Name").unwrap(), vec!["Foo"]);
        assert_eq!(doc.get_integer_value("Ids").unwrap(), 1);
        assert_eq!(doc.get_integer_array_value("VersionId").unwrap(), vec![100]);
        assert_eq!(doc.version_id().unwrap(), 100);
        assert_eq!(doc.version_id_term().unwrap(), SnTerm::int("VersionId", 100i32));
    }

    #[test]
    fn test_serialization_round_trip_is_exact() {
        let doc = sample_document();
        for one_line in [true, false] {
            let text = doc.serialize(one_line).unwrap();
            let decoded = IndexDocument::deserialize(&text).unwrap();
            assert_eq!(decoded.serialize(one_line).unwrap(), text);
            assert_eq!(decoded, doc);
        }
    }

    #[test]
    fn test_non_finite_floats_round_trip() {
        let doc = IndexDocument::from_fields(vec![
            IndexField::with_defaults("Score", f64::NAN),
            IndexField::with_defaults("Weight", f32::INFINITY),
            IndexField::with_defaults("Floor", f64::NEG_INFINITY),
        ]);

        let text = doc.serialize(true).unwrap();
        assert!(!text.contains("null"));
        assert!(text.contains(r#"{"Name":"Score","Type":"Double","Value":"NaN"}"#));
        assert!(text.contains(r#"{"Name":"Weight","Type":"Float","Value":"Infinity"}"#));

        let parsed = IndexDocument::deserialize(&text).unwrap();
        assert_eq!(parsed.serialize(true).unwrap(), text);
        assert!(parsed.get_double_value("Score").unwrap().is_nan());
        assert_eq!(parsed.get_single_value("Weight").unwrap(), f32::INFINITY);
    }

    #[test]
    fn test_serialization_is_name_ordered() {
        let doc = IndexDocument::from_fields(vec![
            IndexField::with_defaults("b", 2i32),
            IndexField::with_defaults("a", 1i32),
        ]);
        assert_eq!(
            doc.serialize(true).unwrap(),
            r#"[{"Name":"a","Type":"Int","Value":1},{"Name":"b","Type":"Int","Value":2}]"#
        );
    }

    #[test]
    fn test_deserialize_failures_are_serialization_errors() {
        for text in [
            "not json",
            r#"{"Name":"a"}"#,
            r#"[{"Name":"a","Type":"Int","Value":"1"}]"#,
            r#"[{"Name":"a","Type":"Unknown","Value":1}]"#,
        ] {
            let err = IndexDocument::deserialize(text).unwrap_err();
            assert!(
                matches!(err, IndexDataError::Serialization(_)),
                "{} gave {:?}",
                text,
                err
            );
        }
    }

    #[test]
    fn test_document_update_json() {
        let update = DocumentUpdate::new(
            SnTerm::int("VersionId", 5),
            IndexDocument::from_fields(vec![IndexField::with_defaults("VersionId", 5i32)]),
        );
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(
            json,
            r#"{"UpdateTerm":{"Name":"VersionId","Type":"Int","Value":5},"Document":[{"Name":"VersionId","Type":"Int","Value":5}]}"#
        );
        let decoded: DocumentUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, update);
    }
}
