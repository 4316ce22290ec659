//! Field-level write authorization for JSON documents.
//!
//! A [`PatchRules`] engine is built once from an ordered list of rule
//! strings. Each call to [`PatchRules::apply`] takes the current document and
//! a candidate replacement, decides path by path which values of the
//! candidate may be written, and returns a fresh patched document together
//! with the paths that were written, denied or failed.
//!
//! ```
//! use patch_rules::PatchRules;
//! use serde_json::json;
//!
//! let rules = PatchRules::new(["user.name", "user.tags[:unique:]"]).unwrap();
//! let old = json!({"user": {"name": "Bob", "role": "admin", "tags": ["a"]}});
//! let new = json!({"user": {"name": "Jane", "role": "root", "tags": ["a", "a", "b"]}});
//!
//! let out = rules.apply(&old, &new).unwrap();
//! assert_eq!(out.patched_document["user"]["name"], "Jane");
//! assert_eq!(out.patched_document["user"]["role"], "admin");
//! assert_eq!(out.patched_document["user"]["tags"], json!(["a", "b"]));
//! assert_eq!(out.denied_paths, vec!["user.role"]);
//! assert!(!out.fully_patched);
//! ```

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;


pub use api::{ApplyReport, DEFAULT_MAX_DEPTH, Options, PatchOutcome, PatchRules, VerdictSummary, patch_rules};
pub use engine::{ApplyMetrics, RuleFlags, RuleSpec, tree};
pub use error::{PatchRulesError, TreeError};

/// Documents are plain `serde_json` values.
pub type Document = serde_json::Value;

// --- Internal types ---------------------------------------------------------

/// Path of the document root.
pub(crate) const ROOT_PATH: &str = "";

/// Placeholder leaf path yielded for an empty root array, so a rule has
/// something to match when the candidate clears the whole array.
pub(crate) const EMPTY_ROOT_ARRAY: &str = "[]";

/// How an allowed verdict writes its effective path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Copy the candidate value; an empty value deletes instead.
    Leaf,
    /// Copy the candidate subtree verbatim.
    Replace,
    /// Copy the candidate array with duplicates removed.
    Unique,
}

/// Outcome of permission resolution for one effective path.
///
/// `rule` indexes the engine's compiled rule list. `None` marks a default
/// deny: no rule wrote anything for the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Verdict {
    pub allowed: bool,
    pub rule: Option<usize>,
    pub mode: WriteMode,
}

impl Verdict {
    pub fn from_rule(spec: &RuleSpec, rule: usize) -> Self {
        let mode = if spec.dedupe() {
            WriteMode::Unique
        } else if spec.whole_replace() {
            WriteMode::Replace
        } else {
            WriteMode::Leaf
        };
        Verdict { allowed: !spec.denies(), rule: Some(rule), mode }
    }

    pub fn default_deny() -> Self {
        Verdict { allowed: false, rule: None, mode: WriteMode::Leaf }
    }

    /// The same decision, applied to a single leaf of a scope.
    pub fn as_leaf(self) -> Self {
        Verdict { mode: WriteMode::Leaf, ..self }
    }
}

/// Short name of a value's kind, used in error messages.
pub(crate) fn value_kind(value: &Document) -> &'static str {
    match value {
        Document::Null => "null",
        Document::Bool(_) => "boolean",
        Document::Number(_) => "number",
        Document::String(_) => "string",
        Document::Array(_) => "array",
        Document::Object(_) => "object",
    }
}
