//! Array deduplication for `[:unique:]` rules.
//!
//! Only arrays of `null`, numbers and strings can be deduplicated. Booleans
//! and nested containers are rejected: the caller records the path as a
//! uniqueness violation instead of guessing at an equality.
//!
//! ## What counts as "the same element"
//!
//! `ScalarKey` compares numbers by their JSON text, so `1` and `1.0` stay
//! distinct, and never equates a string with a number (`"1"` vs `1`).

use serde_json::Value;
use std::collections::HashSet;

/// Hashable identity of a dedupable scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ScalarKey {
    Null,
    Number(String),
    String(String),
}

impl ScalarKey {
    /// Key for `value`, or `None` for booleans and containers.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(ScalarKey::Null),
            Value::Number(n) => Some(ScalarKey::Number(n.to_string())),
            Value::String(s) => Some(ScalarKey::String(s.clone())),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Drop repeated elements, keeping the first occurrence of each.
///
/// Returns the offending element when the array holds something that has no
/// [`ScalarKey`].
pub(crate) fn dedupe(items: &[Value]) -> Result<Vec<Value>, &Value> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        let key = ScalarKey::from_value(item).ok_or(item)?;
        if seen.insert(key) {
            unique.push(item.clone());
        }
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_first_occurrence_order() {
        let items = vec![json!("a"), json!("a"), json!("b"), json!("c"), json!("d"), json!("d")];
        assert_eq!(dedupe(&items).unwrap(), vec![json!("a"), json!("b"), json!("c"), json!("d")]);
    }

    #[test]
    fn numbers_and_strings_are_distinct() {
        let items = vec![json!(1), json!("1"), json!(1), json!(null), json!(null), json!(1.5)];
        assert_eq!(dedupe(&items).unwrap(), vec![json!(1), json!("1"), json!(null), json!(1.5)]);
    }

    #[test]
    fn rejects_booleans_and_containers() {
        assert_eq!(dedupe(&[json!("a"), json!(true)]), Err(&json!(true)));
        assert_eq!(dedupe(&[json!({"a": 1})]), Err(&json!({"a": 1})));
        assert_eq!(dedupe(&[json!([1])]), Err(&json!([1])));
    }

    #[test]
    fn empty_array_stays_empty() {
        assert_eq!(dedupe(&[]).unwrap(), Vec::<Value>::new());
    }
}
