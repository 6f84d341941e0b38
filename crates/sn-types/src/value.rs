//! Typed atomic index values.
//!
//! `IndexValue` is the closed set of payloads an index field or term can
//! carry. Every value has two text renderings:
//! - the term text (`term_texts`) used as the native keyword, one per element
//! - the flagged value text used by the diagnostic `name:value:flag` form

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexDataError;

/// Type tag of an [`IndexValue`], serialized by variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexValueType {
    String,
    StringArray,
    Bool,
    Int,
    IntArray,
    Long,
    Float,
    Double,
    DateTime,
}

impl IndexValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexValueType::String => "String",
            IndexValueType::StringArray => "StringArray",
            IndexValueType::Bool => "Bool",
            IndexValueType::Int => "Int",
            IndexValueType::IntArray => "IntArray",
            IndexValueType::Long => "Long",
            IndexValueType::Float => "Float",
            IndexValueType::Double => "Double",
            IndexValueType::DateTime => "DateTime",
        }
    }

    /// Short flag used at the end of the flagged text form.
    pub fn flag(&self) -> &'static str {
        match self {
            IndexValueType::String => "S",
            IndexValueType::StringArray => "A",
            IndexValueType::Bool => "B",
            IndexValueType::Int => "I",
            IndexValueType::IntArray => "IA",
            IndexValueType::Long => "L",
            IndexValueType::Float => "F",
            IndexValueType::Double => "D",
            IndexValueType::DateTime => "T",
        }
    }

    /// Parse a type flag, returning None for unknown flags.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "S" => Some(IndexValueType::String),
            "A" => Some(IndexValueType::StringArray),
            "B" => Some(IndexValueType::Bool),
            "I" => Some(IndexValueType::Int),
            "IA" => Some(IndexValueType::IntArray),
            "L" => Some(IndexValueType::Long),
            "F" => Some(IndexValueType::Float),
            "D" => Some(IndexValueType::Double),
            "T" => Some(IndexValueType::DateTime),
            _ => None,
        }
    }
}

impl std::fmt::Display for IndexValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, immutable index value.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    String(String),
    StringArray(Vec<String>),
    Bool(bool),
    Int(i32),
    IntArray(Vec<i32>),
    Long(i64),
    Float(f32),
    Double(f64),
    DateTime(DateTime<Utc>),
}

impl IndexValue {
    pub fn value_type(&self) -> IndexValueType {
        match self {
            IndexValue::String(_) => IndexValueType::String,
            IndexValue::StringArray(_) => IndexValueType::StringArray,
            IndexValue::Bool(_) => IndexValueType::Bool,
            IndexValue::Int(_) => IndexValueType::Int,
            IndexValue::IntArray(_) => IndexValueType::IntArray,
            IndexValue::Long(_) => IndexValueType::Long,
            IndexValue::Float(_) => IndexValueType::Float,
            IndexValue::Double(_) => IndexValueType::Double,
            IndexValue::DateTime(_) => IndexValueType::DateTime,
        }
    }

    /// Keyword texts of this value: one entry per array element, one for scalars.
    pub fn term_texts(&self) -> Vec<String> {
        match self {
            IndexValue::String(s) => vec![s.clone()],
            IndexValue::StringArray(items) => items.clone(),
            IndexValue::IntArray(items) => items.iter().map(|i| i.to_string()).collect(),
            other => vec![other.scalar_text()],
        }
    }

    /// Value portion of the flagged text form.
    pub fn to_flagged_text(&self) -> String {
        match self {
            IndexValue::StringArray(items) => join_escaped(items.iter().map(String::as_str)),
            IndexValue::IntArray(items) => {
                let texts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                join_escaped(texts.iter().map(String::as_str))
            }
            other => other.scalar_text(),
        }
    }

    /// Parse the value portion of the flagged text form for the given type.
    pub fn parse_flagged_text(
        value_type: IndexValueType,
        text: &str,
    ) -> Result<Self, IndexDataError> {
        let value = match value_type {
            IndexValueType::String => IndexValue::String(text.to_string()),
            IndexValueType::StringArray => IndexValue::StringArray(split_escaped(text)),
            IndexValueType::Bool => match text {
                "yes" => IndexValue::Bool(true),
                "no" => IndexValue::Bool(false),
                _ => return Err(parse_error(value_type, text)),
            },
            IndexValueType::Int => {
                IndexValue::Int(text.parse().map_err(|_| parse_error(value_type, text))?)
            }
            IndexValueType::IntArray => {
                let items = split_escaped(text)
                    .iter()
                    .map(|item| item.parse::<i32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| parse_error(value_type, text))?;
                IndexValue::IntArray(items)
            }
            IndexValueType::Long => {
                IndexValue::Long(text.parse().map_err(|_| parse_error(value_type, text))?)
            }
            IndexValueType::Float => {
                IndexValue::Float(text.parse().map_err(|_| parse_error(value_type, text))?)
            }
            IndexValueType::Double => {
                IndexValue::Double(text.parse().map_err(|_| parse_error(value_type, text))?)
            }
            IndexValueType::DateTime => IndexValue::DateTime(parse_date_time(text)?),
        };
        Ok(value)
    }

    /// Convert a JSON `Value` payload into a typed value.
    ///
    /// The JSON shape must match `value_type` exactly; nothing is coerced.
    pub fn from_json(
        value_type: IndexValueType,
        json: &serde_json::Value,
    ) -> Result<Self, IndexDataError> {
        let mismatch = || {
            IndexDataError::Serialization(format!(
                "value {} does not match type {}",
                json, value_type
            ))
        };

        let value = match value_type {
            IndexValueType::String => IndexValue::String(json.as_str().ok_or_else(mismatch)?.to_string()),
            IndexValueType::StringArray => {
                let items = json
                    .as_array()
                    .ok_or_else(mismatch)?
                    .iter()
                    .map(|item| item.as_str().map(str::to_string).ok_or_else(mismatch))
                    .collect::<Result<Vec<_>, _>>()?;
                IndexValue::StringArray(items)
            }
            IndexValueType::Bool => IndexValue::Bool(json.as_bool().ok_or_else(mismatch)?),
            IndexValueType::Int => IndexValue::Int(json_to_i32(json).ok_or_else(mismatch)?),
            IndexValueType::IntArray => {
                let items = json
                    .as_array()
                    .ok_or_else(mismatch)?
                    .iter()
                    .map(|item| json_to_i32(item).ok_or_else(mismatch))
                    .collect::<Result<Vec<_>, _>>()?;
                IndexValue::IntArray(items)
            }
            IndexValueType::Long => IndexValue::Long(json.as_i64().ok_or_else(mismatch)?),
            IndexValueType::Float => IndexValue::Float(json_to_f64(json).ok_or_else(mismatch)? as f32),
            IndexValueType::Double => IndexValue::Double(json_to_f64(json).ok_or_else(mismatch)?),
            IndexValueType::DateTime => {
                IndexValue::DateTime(parse_date_time(json.as_str().ok_or_else(mismatch)?)?)
            }
        };
        Ok(value)
    }

    fn scalar_text(&self) -> String {
        match self {
            IndexValue::String(s) => s.clone(),
            IndexValue::Bool(true) => "yes".to_string(),
            IndexValue::Bool(false) => "no".to_string(),
            IndexValue::Int(i) => i.to_string(),
            IndexValue::Long(l) => l.to_string(),
            IndexValue::Float(f) => f.to_string(),
            IndexValue::Double(d) => d.to_string(),
            IndexValue::DateTime(dt) => format_date_time(dt),
            IndexValue::StringArray(_) | IndexValue::IntArray(_) => self.to_flagged_text(),
        }
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        IndexValue::String(value.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        IndexValue::String(value)
    }
}

impl From<Vec<String>> for IndexValue {
    fn from(value: Vec<String>) -> Self {
        IndexValue::StringArray(value)
    }
}

impl From<bool> for IndexValue {
    fn from(value: bool) -> Self {
        IndexValue::Bool(value)
    }
}

impl From<i32> for IndexValue {
    fn from(value: i32) -> Self {
        IndexValue::Int(value)
    }
}

impl From<Vec<i32>> for IndexValue {
    fn from(value: Vec<i32>) -> Self {
        IndexValue::IntArray(value)
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        IndexValue::Long(value)
    }
}

impl From<f32> for IndexValue {
    fn from(value: f32) -> Self {
        IndexValue::Float(value)
    }
}

impl From<f64> for IndexValue {
    fn from(value: f64) -> Self {
        IndexValue::Double(value)
    }
}

impl From<DateTime<Utc>> for IndexValue {
    fn from(value: DateTime<Utc>) -> Self {
        IndexValue::DateTime(value)
    }
}

/// RFC 3339 text with as many sub-second digits as needed.
pub fn format_date_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_date_time(text: &str) -> Result<DateTime<Utc>, IndexDataError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IndexDataError::Serialization(format!("invalid date time '{}': {}", text, e)))
}

/// JSON text of a NaN or infinite float, which JSON numbers cannot carry.
pub(crate) fn non_finite_json(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("NaN")
    } else if value == f64::INFINITY {
        Some("Infinity")
    } else if value == f64::NEG_INFINITY {
        Some("-Infinity")
    } else {
        None
    }
}

fn json_to_f64(json: &serde_json::Value) -> Option<f64> {
    json.as_f64().or_else(|| match json.as_str()? {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    })
}

fn json_to_i32(json: &serde_json::Value) -> Option<i32> {
    json.as_i64().and_then(|i| i32::try_from(i).ok())
}

fn parse_error(value_type: IndexValueType, text: &str) -> IndexDataError {
    IndexDataError::Serialization(format!("cannot parse '{}' as {}", text, value_type))
}

fn join_escaped<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items
        .map(|item| item.replace('\\', "\\\\").replace(',', "\\,"))
        .collect::<Vec<_>>()
        .join(",")
}

fn split_escaped(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_type_flags() {
        let all = [
            IndexValueType::String,
            IndexValueType::StringArray,
            IndexValueType::Bool,
            IndexValueType::Int,
            IndexValueType::IntArray,
            IndexValueType::Long,
            IndexValueType::Float,
            IndexValueType::Double,
            IndexValueType::DateTime,
        ];
        for value_type in all {
            assert_eq!(IndexValueType::from_flag(value_type.flag()), Some(value_type));
        }
        assert_eq!(IndexValueType::from_flag("X"), None);
    }

    #[test]
    fn test_value_type_serialization() {
        let json = serde_json::to_string(&IndexValueType::StringArray).unwrap();
        assert_eq!(json, "\"StringArray\"");
        let parsed: IndexValueType = serde_json::from_str("\"DateTime\"").unwrap();
        assert_eq!(parsed, IndexValueType::DateTime);
        assert!(serde_json::from_str::<IndexValueType>("\"Decimal\"").is_err());
    }

    #[test]
    fn test_term_texts() {
        assert_eq!(IndexValue::Bool(true).term_texts(), vec!["yes"]);
        assert_eq!(IndexValue::Int(42).term_texts(), vec!["42"]);
        assert_eq!(
            IndexValue::StringArray(vec!["a".into(), "b,c".into()]).term_texts(),
            vec!["a", "b,c"]
        );
        assert_eq!(IndexValue::IntArray(vec![1, 2]).term_texts(), vec!["1", "2"]);
    }

    #[test]
    fn test_flagged_text_escapes_array_items() {
        let value = IndexValue::StringArray(vec!["a,b".into(), "c\\d".into(), "e".into()]);
        let text = value.to_flagged_text();
        assert_eq!(text, "a\\,b,c\\\\d,e");
        let parsed = IndexValue::parse_flagged_text(IndexValueType::StringArray, &text).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_flagged_text_scalars() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let cases = vec![
            IndexValue::Bool(false),
            IndexValue::Int(-7),
            IndexValue::Long(9_000_000_000),
            IndexValue::Float(1.5),
            IndexValue::Double(0.125),
            IndexValue::DateTime(dt),
            IndexValue::IntArray(vec![3, 4, 5]),
        ];
        for value in cases {
            let text = value.to_flagged_text();
            let parsed = IndexValue::parse_flagged_text(value.value_type(), &text).unwrap();
            assert_eq!(parsed, value);
        }
    }

    #[test]
    fn test_flagged_text_rejects_garbage() {
        assert!(IndexValue::parse_flagged_text(IndexValueType::Int, "abc").is_err());
        assert!(IndexValue::parse_flagged_text(IndexValueType::Bool, "true").is_err());
        assert!(IndexValue::parse_flagged_text(IndexValueType::DateTime, "yesterday").is_err());
    }

    #[test]
    fn test_from_json_is_strict() {
        let json = serde_json::json!("12");
        assert!(IndexValue::from_json(IndexValueType::Int, &json).is_err());

        let json = serde_json::json!(3_000_000_000_i64);
        assert!(IndexValue::from_json(IndexValueType::Int, &json).is_err());
        assert_eq!(
            IndexValue::from_json(IndexValueType::Long, &json).unwrap(),
            IndexValue::Long(3_000_000_000)
        );

        let json = serde_json::json!(["a", 1]);
        assert!(IndexValue::from_json(IndexValueType::StringArray, &json).is_err());
    }

    #[test]
    fn test_from_json_non_finite_floats() {
        let json = serde_json::json!("NaN");
        let value = IndexValue::from_json(IndexValueType::Double, &json).unwrap();
        assert!(matches!(value, IndexValue::Double(d) if d.is_nan()));

        let json = serde_json::json!("-Infinity");
        assert_eq!(
            IndexValue::from_json(IndexValueType::Float, &json).unwrap(),
            IndexValue::Float(f32::NEG_INFINITY)
        );

        // Only floating types accept the names, and only the exact names.
        assert!(IndexValue::from_json(IndexValueType::Long, &serde_json::json!("Infinity")).is_err());
        assert!(IndexValue::from_json(IndexValueType::Double, &serde_json::json!("inf")).is_err());
        assert!(IndexValue::from_json(IndexValueType::Double, &serde_json::Value::Null).is_err());
    }

    #[test]
    fn test_empty_array_text() {
        let value = IndexValue::StringArray(Vec::new());
        assert_eq!(value.to_flagged_text(), "");
        let parsed = IndexValue::parse_flagged_text(IndexValueType::StringArray, "").unwrap();
        assert_eq!(parsed, value);
    }
}
