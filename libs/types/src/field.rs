//! Field-value union and the flat field-map view
//!
//! The delta engine and filter evaluator never look at the typed
//! instrument variant directly; they operate on a flat mapping from
//! field name to `FieldValue`. Equality between field values defines
//! what "changed" means for delta emission:
//! - numbers compare with floating-point `==` (no epsilon)
//! - timestamps compare as epoch-millisecond integers
//! - lists compare element-wise
//!
//! The derived `PartialEq` implements exactly these rules.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A single typed field value.
///
/// Serializes untagged: numbers and timestamps as JSON numbers,
/// enumerations as their string tag via `Text`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric field (prices, sizes, rates, Greeks)
    Number(f64),
    /// String field (enum tags, symbols, descriptions)
    Text(String),
    /// Boolean field
    Bool(bool),
    /// Epoch-millisecond timestamp or date field
    Timestamp(i64),
    /// Flat list of values (element-wise equality)
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Numeric view: numbers and timestamps both coerce to f64 so a
    /// predicate can compare `lastUpdate` against a literal.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Timestamp(ts) => Some(*ts as f64),
            _ => None,
        }
    }

    /// String view for text fields.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "string",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::List(_) => "list",
        }
    }

    /// Convert a JSON value into a field value.
    ///
    /// Returns None for nulls, objects, and non-finite numbers; the
    /// caller decides whether that is an invalid-argument condition.
    /// JSON numbers map to `Number`; timestamp fields are recognized
    /// by name at the assignment site, not by shape.
    pub fn from_json(value: &Value) -> Option<FieldValue> {
        match value {
            Value::Number(n) => n.as_f64().map(FieldValue::Number),
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Array(items) => {
                let converted: Option<Vec<FieldValue>> =
                    items.iter().map(FieldValue::from_json).collect();
                converted.map(FieldValue::List)
            }
            Value::Null | Value::Object(_) => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Flat view of an instrument: field name → typed value.
///
/// BTreeMap keeps iteration deterministic so emitted deltas list
/// fields in a stable order.
pub type FieldMap = BTreeMap<&'static str, FieldValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_equality_is_exact() {
        assert_eq!(FieldValue::Number(100.25), FieldValue::Number(100.25));
        assert_ne!(
            FieldValue::Number(100.25),
            FieldValue::Number(100.25 + 1e-9)
        );
    }

    #[test]
    fn test_timestamp_vs_number_not_equal() {
        assert_ne!(FieldValue::Timestamp(1000), FieldValue::Number(1000.0));
    }

    #[test]
    fn test_list_equality_element_wise() {
        let a = FieldValue::List(vec![FieldValue::Number(1.0), FieldValue::Number(2.0)]);
        let b = FieldValue::List(vec![FieldValue::Number(1.0), FieldValue::Number(2.0)]);
        let c = FieldValue::List(vec![FieldValue::Number(1.0)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_serialize_untagged() {
        assert_eq!(
            serde_json::to_string(&FieldValue::Number(4.25)).unwrap(),
            "4.25"
        );
        assert_eq!(
            serde_json::to_string(&FieldValue::Timestamp(1708123456789)).unwrap(),
            "1708123456789"
        );
        assert_eq!(
            serde_json::to_string(&FieldValue::Text("ACTIVE".to_string())).unwrap(),
            "\"ACTIVE\""
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            FieldValue::from_json(&serde_json::json!(99.5)),
            Some(FieldValue::Number(99.5))
        );
        assert_eq!(
            FieldValue::from_json(&serde_json::json!("Bond")),
            Some(FieldValue::Text("Bond".to_string()))
        );
        assert_eq!(FieldValue::from_json(&serde_json::json!(null)), None);
        assert_eq!(FieldValue::from_json(&serde_json::json!({"a": 1})), None);
    }

    #[test]
    fn test_as_f64_coerces_timestamps() {
        assert_eq!(FieldValue::Timestamp(500).as_f64(), Some(500.0));
        assert_eq!(FieldValue::Number(1.5).as_f64(), Some(1.5));
        assert_eq!(FieldValue::Text("x".to_string()).as_f64(), None);
    }
}
