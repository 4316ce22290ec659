//! Patch application.
//!
//! Consumes a [`VerdictMap`] and writes the permitted parts of the candidate
//! document into a clone of the old one. Effective paths never nest, so each
//! one is handled independently; a failure on one path is recorded and the
//! rest still run.
//!
//! ```text
//! verdict ──┬─ denied            -> denied_paths
//!           ├─ allowed + Unique  -> dedupe array, write     (or error + denied)
//!           ├─ allowed + Replace -> write candidate value verbatim
//!           └─ allowed + Leaf    -> empty value ? unset : set
//! ```
//!
//! "Empty" means `null`, `false`, `0`, `""`, `[]` or `{}`: writing one of
//! those through a leaf rule deletes the member instead, so a leaf can never
//! be set to its zero value. An array element is cleared to `null` rather
//! than removed, so the indices of its siblings keep their meaning and a
//! second pass with the same candidate changes nothing.

use super::dedup::dedupe;
use super::resolve::VerdictMap;
use super::tree;
use crate::error::PatchRulesError;
use crate::{EMPTY_ROOT_ARRAY, PatchOutcome, ROOT_PATH, Verdict, WriteMode, value_kind};
use serde_json::Value;
use tracing::{debug, warn};

/// Reject documents whose roots cannot be reconciled: exactly one of them
/// is an array.
pub(crate) fn check_root_kinds(old: &Value, new: &Value) -> Result<(), PatchRulesError> {
    if old.is_array() != new.is_array() {
        return Err(PatchRulesError::StructuralTypeMismatch { old: value_kind(old), new: value_kind(new) });
    }
    Ok(())
}

/// Apply `verdicts` to a clone of `old`, reading values from `new`.
pub(crate) fn patch(old: &Value, new: &Value, verdicts: &VerdictMap) -> PatchOutcome {
    let mut patcher = Patcher {
        document: old.clone(),
        new,
        success_paths: Vec::new(),
        denied_paths: Vec::new(),
        errors: Vec::new(),
    };

    for (path, verdict) in verdicts.iter() {
        patcher.apply(path, verdict);
    }

    debug!(
        success = patcher.success_paths.len(),
        denied = patcher.denied_paths.len(),
        errors = patcher.errors.len(),
        "patch applied"
    );

    let fully_patched = patcher.denied_paths.is_empty();
    PatchOutcome {
        patched_document: patcher.document,
        success_paths: patcher.success_paths,
        denied_paths: patcher.denied_paths,
        errors: patcher.errors,
        fully_patched,
    }
}

struct Patcher<'a> {
    document: Value,
    new: &'a Value,
    success_paths: Vec<String>,
    denied_paths: Vec<String>,
    errors: Vec<(String, String)>,
}

impl<'a> Patcher<'a> {
    fn apply(&mut self, path: &str, verdict: Verdict) {
        // The placeholder stands for "the new root is an empty array".
        if path == EMPTY_ROOT_ARRAY {
            if verdict.allowed {
                self.document = Value::Array(Vec::new());
                self.success_paths.push(ROOT_PATH.to_string());
            } else {
                self.denied_paths.push(ROOT_PATH.to_string());
            }
            return;
        }

        if !verdict.allowed {
            self.denied_paths.push(path.to_string());
            return;
        }

        let written = match verdict.mode {
            WriteMode::Unique => self.write_unique(path),
            WriteMode::Replace => self.write_replace(path),
            WriteMode::Leaf => self.write_leaf(path),
        };

        match written {
            Ok(()) => self.success_paths.push(path.to_string()),
            Err(message) => {
                warn!(path, %message, "write rejected");
                self.errors.push((path.to_string(), message));
                self.denied_paths.push(path.to_string());
            }
        }
    }

    fn write_unique(&mut self, path: &str) -> Result<(), String> {
        let items = match self.candidate(path)? {
            Value::Array(items) => items,
            other => return Err(format!("[:unique:] requires an array, found {}", value_kind(other))),
        };

        let unique = dedupe(items).map_err(|element| {
            format!("[:unique:] arrays may only hold strings, numbers and null, found {}", value_kind(element))
        })?;
        tree::set(&mut self.document, path, Value::Array(unique)).map_err(|err| err.to_string())
    }

    fn write_replace(&mut self, path: &str) -> Result<(), String> {
        let value = self.candidate(path)?.clone();
        tree::set(&mut self.document, path, value).map_err(|err| err.to_string())
    }

    fn write_leaf(&mut self, path: &str) -> Result<(), String> {
        let value = self.candidate(path)?;
        let written = if is_empty(value) {
            tree::unset(&mut self.document, path).map(|_| ())
        } else {
            tree::set(&mut self.document, path, value.clone())
        };
        written.map_err(|err| err.to_string())
    }

    /// Value of `path` in the candidate document.
    ///
    /// Every effective path was derived from the candidate, so a miss means
    /// the path cannot be addressed (a key containing `.` or `[`).
    fn candidate(&self, path: &str) -> Result<&'a Value, String> {
        tree::get(self.new, path).ok_or_else(|| format!("path '{path}' cannot be addressed in the candidate document"))
    }
}

/// Values a leaf write treats as a delete.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_values() {
        for value in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(is_empty(&value), "{value} should be empty");
        }
        for value in [json!(true), json!(1), json!(-0.5), json!(" "), json!([0]), json!({"a": null})] {
            assert!(!is_empty(&value), "{value} should not be empty");
        }
    }

    #[test]
    fn root_kind_check() {
        assert!(check_root_kinds(&json!({}), &json!({"a": 1})).is_ok());
        assert!(check_root_kinds(&json!([1]), &json!([])).is_ok());
        assert!(check_root_kinds(&json!("x"), &json!({})).is_ok());
        assert_eq!(
            check_root_kinds(&json!({}), &json!([])),
            Err(PatchRulesError::StructuralTypeMismatch { old: "object", new: "array" })
        );
        assert_eq!(
            check_root_kinds(&json!([]), &json!(null)),
            Err(PatchRulesError::StructuralTypeMismatch { old: "array", new: "null" })
        );
    }
}
