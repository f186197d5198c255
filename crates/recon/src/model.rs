use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Values + records
// ---------------------------------------------------------------------------

/// A single dynamically-typed field value as delivered by a data source.
///
/// Serialized untagged, so a record round-trips through JSON as a plain
/// object of native JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical string form used in composite keys and CSV cells.
    ///
    /// Null renders as the empty string. Floats use the shortest decimal that
    /// round-trips, printing whole values without a fractional part, so
    /// `Integer(10)` and `Float(10.0)` share the same form.
    pub fn canonical(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::String(s) => s.clone(),
        }
    }

    /// Convert an arbitrary JSON value. Objects and arrays have no scalar
    /// equivalent and are kept as their compact JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            other => write!(f, "{}", other.canonical()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One transaction: field name → value. The field set is not fixed across
/// records of the same source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build a record from a JSON object, converting each member with
    /// [`Value::from_json`].
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Comparison output
// ---------------------------------------------------------------------------

/// A field whose normalized values differ. Carries the original values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub field: String,
    pub value_a: Value,
    pub value_b: Value,
}

/// A key present on both sides with no differing comparison field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub key: String,
    pub record_a: Record,
    pub record_b: Record,
}

/// A key present on both sides with at least one differing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MismatchEntry {
    pub key: String,
    pub record_a: Record,
    pub record_b: Record,
    pub mismatches: Vec<FieldMismatch>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconSummary {
    /// Records fetched from source A, duplicates included.
    pub total_a: usize,
    pub total_b: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub only_in_a: usize,
    pub only_in_b: usize,
    /// Keys seen more than once while indexing source A.
    #[serde(default)]
    pub duplicate_keys_a: usize,
    #[serde(default)]
    pub duplicate_keys_b: usize,
}

impl ReconSummary {
    /// True when both sides agree completely.
    pub fn is_clean(&self) -> bool {
        self.mismatches == 0 && self.only_in_a == 0 && self.only_in_b == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub run_at: String,
}

/// Outcome of one reconciliation run. Detail lists are sorted by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub meta: ReconMeta,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub source_a: String,
    pub source_b: String,
    pub key_fields: Vec<String>,
    pub comparison_fields: Vec<String>,
    pub summary: ReconSummary,
    pub matches: Vec<MatchEntry>,
    pub mismatches: Vec<MismatchEntry>,
    pub only_in_a: Vec<Record>,
    pub only_in_b: Vec<Record>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_forms() {
        assert_eq!(Value::Null.canonical(), "");
        assert_eq!(Value::Bool(true).canonical(), "true");
        assert_eq!(Value::Integer(-42).canonical(), "-42");
        assert_eq!(Value::Float(10.0).canonical(), "10");
        assert_eq!(Value::Float(10.5).canonical(), "10.5");
        assert_eq!(Value::from("  ch_1 ").canonical(), "  ch_1 ");
    }

    #[test]
    fn whole_float_and_integer_share_canonical_form() {
        assert_eq!(Value::Float(1200.0).canonical(), Value::Integer(1200).canonical());
    }

    #[test]
    fn from_json_keeps_nested_values_as_text() {
        let v = serde_json::json!({"card": {"last4": "4242"}, "tags": [1, 2]});
        let record = match v {
            serde_json::Value::Object(map) => Record::from_json_object(map),
            _ => unreachable!(),
        };
        assert_eq!(record.get("card"), Some(&Value::String(r#"{"last4":"4242"}"#.into())));
        assert_eq!(record.get("tags"), Some(&Value::String("[1,2]".into())));
    }

    #[test]
    fn from_json_numbers() {
        assert_eq!(Value::from_json(serde_json::json!(7)), Value::Integer(7));
        assert_eq!(Value::from_json(serde_json::json!(7.25)), Value::Float(7.25));
        assert_eq!(Value::from_json(serde_json::json!(null)), Value::Null);
    }

    #[test]
    fn record_serializes_as_plain_object() {
        let record = Record::new()
            .with("id", "1")
            .with("amount", 10.5)
            .with("captured", true)
            .with("memo", Value::Null);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"amount":10.5,"captured":true,"id":"1","memo":null}"#);

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn option_into_value() {
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Integer(3));
    }
}
