//! Record representation shared by every pipeline stage.
//!
//! A record is an ordered column → value mapping. Column order is the order in
//! which the source produced the columns and is preserved through every
//! transformation, so the clean, quarantine and clean-processed outputs keep
//! the input's column layout.

use serde_json::{Map, Value};

/// A single schema-typed row. Stages never mutate a record they were handed;
/// redaction works on a clone.
pub type Record = Map<String, Value>;

/// Renders a value the way `CAST(x AS STRING)` does. `None` means SQL NULL.
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        // Nested values are compared against their JSON text.
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Returns the column names of a record in order.
pub fn columns_of(record: &Record) -> Vec<String> {
    record.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_string_scalars() {
        assert_eq!(value_as_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(value_as_string(&json!(4111)), Some("4111".to_string()));
        assert_eq!(value_as_string(&json!(true)), Some("true".to_string()));
        assert_eq!(value_as_string(&Value::Null), None);
    }

    #[test]
    fn test_columns_keep_insertion_order() {
        let record: Record = serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        assert_eq!(columns_of(&record), vec!["zeta", "alpha", "mid"]);
    }
}
