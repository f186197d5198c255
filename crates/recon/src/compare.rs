use std::collections::BTreeSet;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::model::{FieldMismatch, Record, Value};

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// A value reduced to the form used for cross-system comparison.
#[derive(Debug, Clone)]
pub enum Normalized {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl PartialEq for Normalized {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Normalized> for Value {
    fn from(n: Normalized) -> Self {
        match n {
            Normalized::Text(s) => Value::String(s),
            Normalized::Number(x) => Value::Float(x),
            Normalized::Bool(b) => Value::Bool(b),
        }
    }
}

/// Magnitude (2^52) from which every `f64` is a whole number.
const WHOLE_NUMBER_LIMIT: f64 = 4_503_599_627_370_496.0;

/// Round to cents. Amounts are assumed to be monetary.
///
/// Rounds the exact binary value of `x`, ties to even, so `2.675` (stored
/// as 2.67499...) gives 2.67 and `0.625` gives 0.62.
pub fn round_money(x: f64) -> f64 {
    if !x.is_finite() || x.abs() >= WHOLE_NUMBER_LIMIT {
        return x;
    }
    let Some(exact) = Decimal::from_f64_retain(x) else {
        return x;
    };
    let cents = exact.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    cents.to_string().parse().unwrap_or(x)
}

/// Normalize one value: null → `""`, numbers rounded to 2 places, strings
/// trimmed and lowercased, booleans unchanged.
pub fn normalize(value: &Value) -> Normalized {
    match value {
        Value::Null => Normalized::Text(String::new()),
        Value::Bool(b) => Normalized::Bool(*b),
        Value::Integer(i) => Normalized::Number(*i as f64),
        Value::Float(x) => Normalized::Number(round_money(*x)),
        Value::String(s) => Normalized::Text(s.trim().to_lowercase()),
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Compare `fields` of two records after normalization. Absent fields are
/// treated as null. Returns mismatches in `fields` order; empty means the
/// pair is a clean match.
pub fn compare(record_a: &Record, record_b: &Record, fields: &[String]) -> Vec<FieldMismatch> {
    let mut mismatches = Vec::new();

    for field in fields {
        let value_a = record_a.get(field).cloned().unwrap_or(Value::Null);
        let value_b = record_b.get(field).cloned().unwrap_or(Value::Null);

        if normalize(&value_a) != normalize(&value_b) {
            mismatches.push(FieldMismatch {
                field: field.clone(),
                value_a,
                value_b,
            });
        }
    }

    mismatches
}

// ---------------------------------------------------------------------------
// Default comparison fields
// ---------------------------------------------------------------------------

/// Union of the field names of `records` and any names the source lists.
pub fn observed_fields<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    listed: &[String],
) -> BTreeSet<String> {
    let mut fields: BTreeSet<String> = listed.iter().cloned().collect();
    for record in records {
        fields.extend(record.field_names().map(str::to_string));
    }
    fields
}

/// Fields compared when the caller names none: present on both sides,
/// excluding key fields, sorted by name.
pub fn default_comparison_fields(
    fields_a: &BTreeSet<String>,
    fields_b: &BTreeSet<String>,
    key_fields: &[String],
) -> Vec<String> {
    fields_a
        .intersection(fields_b)
        .filter(|f| !key_fields.contains(*f))
        .cloned()
        .collect()
}
