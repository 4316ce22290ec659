//! Error types.
//!
//! Only failures that make a whole call meaningless surface as
//! [`PatchRulesError`]. Per-path problems (a `[:unique:]` array holding
//! booleans, a path the tree utility cannot address) are recorded in
//! [`PatchOutcome::errors`](crate::PatchOutcome::errors) and the call keeps
//! going.

use thiserror::Error;

/// Errors returned by engine construction and [`PatchRules::apply`](crate::PatchRules::apply).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PatchRulesError {
    /// A rule string could not be compiled into a matcher.
    #[error("malformed rule '{rule}': {reason}")]
    MalformedRule {
        /// The rule text as supplied by the caller.
        rule: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Exactly one of the two documents has an array at its root.
    #[error("structural type mismatch: old document root is {old}, new document root is {new}")]
    StructuralTypeMismatch {
        /// Kind of the old document root (`"array"`, `"object"`, ...).
        old: &'static str,
        /// Kind of the new document root.
        new: &'static str,
    },

    /// The candidate document nests deeper than the configured limit.
    #[error("malformed document: nesting exceeds the maximum depth of {max_depth}")]
    MalformedDocument {
        /// The limit that was exceeded (see [`Options::max_depth`](crate::Options::max_depth)).
        max_depth: usize,
    },
}

impl PatchRulesError {
    pub(crate) fn malformed_rule(rule: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRule { rule: rule.to_string(), reason: reason.into() }
    }
}

/// Errors raised by the tree utility when a path cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("empty key segment in path '{0}'")]
    EmptySegment(String),

    #[error("unbalanced '[' in path '{0}'")]
    UnclosedIndex(String),

    #[error("invalid array index '{index}' in path '{path}'")]
    InvalidIndex { path: String, index: String },
}
