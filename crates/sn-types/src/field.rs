//! Index terms and fields.
//!
//! An [`SnTerm`] is a name/value pair used as a delete or update key.
//! An [`IndexField`] is a term plus indexing metadata.
//!
//! Text forms:
//! - term: `name:value:flag`
//! - field: `IM<n>,SM<n>,TV<n>,name:value:flag`
//!
//! JSON form: `{"Name","Type","Mode"?,"Store"?,"TermVector"?,"Value"}` with
//! metadata omitted when it has the default value.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IndexDataError;
use crate::value::{format_date_time, non_finite_json, IndexValue, IndexValueType};

/// How a field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexingMode {
    #[default]
    Default,
    Analyzed,
    AnalyzedNoNorms,
    No,
    NotAnalyzed,
    NotAnalyzedNoNorms,
}

impl IndexingMode {
    const ALL: [IndexingMode; 6] = [
        IndexingMode::Default,
        IndexingMode::Analyzed,
        IndexingMode::AnalyzedNoNorms,
        IndexingMode::No,
        IndexingMode::NotAnalyzed,
        IndexingMode::NotAnalyzedNoNorms,
    ];

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn from_ordinal(n: u8) -> Option<Self> {
        Self::ALL.get(n as usize).copied()
    }

    /// Whether values of this field produce keyword terms.
    pub fn is_indexed(&self) -> bool {
        *self != IndexingMode::No
    }

    /// Whether values of this field also feed the analyzed full-text field.
    pub fn is_analyzed(&self) -> bool {
        matches!(self, IndexingMode::Analyzed | IndexingMode::AnalyzedNoNorms)
    }
}

/// Whether a field value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexStoringMode {
    #[default]
    Default,
    No,
    Yes,
}

impl IndexStoringMode {
    const ALL: [IndexStoringMode; 3] = [
        IndexStoringMode::Default,
        IndexStoringMode::No,
        IndexStoringMode::Yes,
    ];

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn from_ordinal(n: u8) -> Option<Self> {
        Self::ALL.get(n as usize).copied()
    }
}

/// Term vector policy of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexTermVector {
    #[default]
    Default,
    No,
    WithOffsets,
    WithPositions,
    WithPositionsOffsets,
    Yes,
}

impl IndexTermVector {
    const ALL: [IndexTermVector; 6] = [
        IndexTermVector::Default,
        IndexTermVector::No,
        IndexTermVector::WithOffsets,
        IndexTermVector::WithPositions,
        IndexTermVector::WithPositionsOffsets,
        IndexTermVector::Yes,
    ];

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn from_ordinal(n: u8) -> Option<Self> {
        Self::ALL.get(n as usize).copied()
    }
}

/// A field name and value usable as a delete/update key.
#[derive(Debug, Clone, PartialEq)]
pub struct SnTerm {
    pub name: String,
    pub value: IndexValue,
}

impl SnTerm {
    pub fn new(name: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, IndexValue::String(value.into()))
    }

    pub fn string_array(name: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(name, IndexValue::StringArray(values))
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, IndexValue::Bool(value))
    }

    pub fn int(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, IndexValue::Int(value))
    }

    pub fn int_array(name: impl Into<String>, values: Vec<i32>) -> Self {
        Self::new(name, IndexValue::IntArray(values))
    }

    pub fn long(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, IndexValue::Long(value))
    }

    pub fn float(name: impl Into<String>, value: f32) -> Self {
        Self::new(name, IndexValue::Float(value))
    }

    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, IndexValue::Double(value))
    }

    pub fn date_time(name: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::new(name, IndexValue::DateTime(value))
    }

    pub fn value_type(&self) -> IndexValueType {
        self.value.value_type()
    }

    /// Serialize to the JSON object form.
    pub fn serialize_json(&self) -> Result<String, IndexDataError> {
        serde_json::to_string(self).map_err(IndexDataError::from)
    }

    /// Deserialize from the JSON object form.
    pub fn deserialize_json(text: &str) -> Result<Self, IndexDataError> {
        serde_json::from_str(text).map_err(IndexDataError::from)
    }
}

impl std::fmt::Display for SnTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.name,
            self.value.to_flagged_text(),
            self.value_type().flag()
        )
    }
}

impl FromStr for SnTerm {
    type Err = IndexDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = s
            .split_once(':')
            .ok_or_else(|| IndexDataError::Serialization(format!("invalid term text: {}", s)))?;
        let (value_text, flag) = rest
            .rsplit_once(':')
            .ok_or_else(|| IndexDataError::Serialization(format!("invalid term text: {}", s)))?;
        let value_type = IndexValueType::from_flag(flag)
            .ok_or_else(|| IndexDataError::Serialization(format!("unknown type flag: {}", flag)))?;

        Ok(SnTerm {
            name: name.to_string(),
            value: IndexValue::parse_flagged_text(value_type, value_text)?,
        })
    }
}

/// A term plus indexing metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexField {
    pub term: SnTerm,
    pub mode: IndexingMode,
    pub store: IndexStoringMode,
    pub term_vector: IndexTermVector,
}

impl IndexField {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<IndexValue>,
        mode: IndexingMode,
        store: IndexStoringMode,
        term_vector: IndexTermVector,
    ) -> Self {
        Self {
            term: SnTerm::new(name, value),
            mode,
            store,
            term_vector,
        }
    }

    /// A field with default metadata.
    pub fn with_defaults(name: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self::new(
            name,
            value,
            IndexingMode::Default,
            IndexStoringMode::Default,
            IndexTermVector::Default,
        )
    }

    pub fn name(&self) -> &str {
        &self.term.name
    }

    pub fn value(&self) -> &IndexValue {
        &self.term.value
    }

    pub fn value_type(&self) -> IndexValueType {
        self.term.value_type()
    }

    pub fn serialize_json(&self) -> Result<String, IndexDataError> {
        serde_json::to_string(self).map_err(IndexDataError::from)
    }

    pub fn deserialize_json(text: &str) -> Result<Self, IndexDataError> {
        serde_json::from_str(text).map_err(IndexDataError::from)
    }
}

impl std::fmt::Display for IndexField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IM{},SM{},TV{},{}",
            self.mode.ordinal(),
            self.store.ordinal(),
            self.term_vector.ordinal(),
            self.term
        )
    }
}

impl FromStr for IndexField {
    type Err = IndexDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IndexDataError::Serialization(format!("invalid field text: {}", s));

        let mut parts = s.splitn(4, ',');
        let mode = parse_flag_ordinal(parts.next(), "IM")
            .and_then(IndexingMode::from_ordinal)
            .ok_or_else(invalid)?;
        let store = parse_flag_ordinal(parts.next(), "SM")
            .and_then(IndexStoringMode::from_ordinal)
            .ok_or_else(invalid)?;
        let term_vector = parse_flag_ordinal(parts.next(), "TV")
            .and_then(IndexTermVector::from_ordinal)
            .ok_or_else(invalid)?;
        let term: SnTerm = parts.next().ok_or_else(invalid)?.parse()?;

        Ok(IndexField {
            term,
            mode,
            store,
            term_vector,
        })
    }
}

fn parse_flag_ordinal(part: Option<&str>, prefix: &str) -> Option<u8> {
    part?.strip_prefix(prefix)?.parse().ok()
}

fn serialize_value<S: SerializeStruct>(
    state: &mut S,
    value: &IndexValue,
) -> Result<(), S::Error> {
    match value {
        IndexValue::String(v) => state.serialize_field("Value", v),
        IndexValue::StringArray(v) => state.serialize_field("Value", v),
        IndexValue::Bool(v) => state.serialize_field("Value", v),
        IndexValue::Int(v) => state.serialize_field("Value", v),
        IndexValue::IntArray(v) => state.serialize_field("Value", v),
        IndexValue::Long(v) => state.serialize_field("Value", v),
        IndexValue::Float(v) => match non_finite_json(f64::from(*v)) {
            Some(text) => state.serialize_field("Value", text),
            None => state.serialize_field("Value", v),
        },
        IndexValue::Double(v) => match non_finite_json(*v) {
            Some(text) => state.serialize_field("Value", text),
            None => state.serialize_field("Value", v),
        },
        IndexValue::DateTime(v) => state.serialize_field("Value", &format_date_time(v)),
    }
}

impl Serialize for SnTerm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SnTerm", 3)?;
        state.serialize_field("Name", &self.name)?;
        state.serialize_field("Type", &self.value_type())?;
        serialize_value(&mut state, &self.value)?;
        state.end()
    }
}

impl Serialize for IndexField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 3
            + usize::from(self.mode != IndexingMode::Default)
            + usize::from(self.store != IndexStoringMode::Default)
            + usize::from(self.term_vector != IndexTermVector::Default);

        let mut state = serializer.serialize_struct("IndexField", len)?;
        state.serialize_field("Name", &self.term.name)?;
        state.serialize_field("Type", &self.value_type())?;
        if self.mode != IndexingMode::Default {
            state.serialize_field("Mode", &self.mode)?;
        }
        if self.store != IndexStoringMode::Default {
            state.serialize_field("Store", &self.store)?;
        }
        if self.term_vector != IndexTermVector::Default {
            state.serialize_field("TermVector", &self.term_vector)?;
        }
        serialize_value(&mut state, &self.term.value)?;
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTerm {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    value_type: IndexValueType,
    #[serde(rename = "Value")]
    value: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    value_type: IndexValueType,
    #[serde(rename = "Mode", default)]
    mode: IndexingMode,
    #[serde(rename = "Store", default)]
    store: IndexStoringMode,
    #[serde(rename = "TermVector", default)]
    term_vector: IndexTermVector,
    #[serde(rename = "Value")]
    value: serde_json::Value,
}

impl<'de> Deserialize<'de> for SnTerm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawTerm::deserialize(deserializer)?;
        let value = IndexValue::from_json(raw.value_type, &raw.value).map_err(D::Error::custom)?;
        Ok(SnTerm {
            name: raw.name,
            value,
        })
    }
}

impl<'de> Deserialize<'de> for IndexField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawField::deserialize(deserializer)?;
        let value = IndexValue::from_json(raw.value_type, &raw.value).map_err(D::Error::custom)?;
        Ok(IndexField {
            term: SnTerm {
                name: raw.name,
                value,
            },
            mode: raw.mode,
            store: raw.store,
            term_vector: raw.term_vector,
        })
    }
}
