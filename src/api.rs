use crate::engine::{self, ApplyMetrics, RuleSpec, VerdictMap};
use crate::error::PatchRulesError;
use crate::{EMPTY_ROOT_ARRAY, ROOT_PATH};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// Default bound on container nesting in candidate documents.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Options that affect how documents are walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Maximum number of nested containers in a candidate document. Deeper
    /// documents fail with [`PatchRulesError::MalformedDocument`].
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl Options {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Result of one [`PatchRules::apply`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    /// The old document with every permitted write applied. Independent of
    /// both inputs.
    pub patched_document: Value,
    /// Effective paths that were written or deleted, in resolution order.
    pub success_paths: Vec<String>,
    /// Effective paths that were refused, including those listed in `errors`.
    pub denied_paths: Vec<String>,
    /// `(path, message)` for paths that were allowed but could not be written.
    pub errors: Vec<(String, String)>,
    /// `true` when nothing was denied.
    pub fully_patched: bool,
}

/// One resolved verdict, as reported by [`PatchRules::apply_verbose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictSummary {
    /// Effective path (the root is `""`).
    pub path: String,
    pub allowed: bool,
    /// Source text of the rule that decided, `None` for a default deny.
    pub rule: Option<String>,
}

/// Result of [`PatchRules::apply_verbose`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub outcome: PatchOutcome,
    /// Every verdict in resolution order.
    pub verdicts: Vec<VerdictSummary>,
    pub metrics: ApplyMetrics,
}

/// A compiled, reusable rule set.
///
/// Rules are compiled once in [`PatchRules::new`]; the engine holds no other
/// state, so one instance can serve any number of calls, from any number of
/// threads.
#[derive(Debug, Clone)]
pub struct PatchRules {
    rules: Vec<RuleSpec>,
    options: Options,
}

impl PatchRules {
    /// Compile `rules`, in order, with default [`Options`].
    ///
    /// # Errors
    ///
    /// [`PatchRulesError::MalformedRule`] for the first rule that does not
    /// compile.
    ///
    /// # Example
    /// ```
    /// use patch_rules::{PatchRules, PatchRulesError};
    ///
    /// assert!(PatchRules::new(["user.name", "user.contacts[*].label"]).is_ok());
    /// assert!(matches!(PatchRules::new(["{a,b.value"]), Err(PatchRulesError::MalformedRule { .. })));
    /// ```
    pub fn new<I, S>(rules: I) -> Result<Self, PatchRulesError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_options(rules, Options::default())
    }

    /// Compile `rules` with explicit `options`.
    pub fn with_options<I, S>(rules: I, options: Options) -> Result<Self, PatchRulesError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = rules.into_iter().map(|rule| RuleSpec::compile(rule.as_ref())).collect::<Result<Vec<_>, _>>()?;
        debug!(rules = rules.len(), max_depth = options.max_depth, "compiled rule set");
        Ok(PatchRules { rules, options })
    }

    /// The compiled rules, in declared order.
    pub fn rules(&self) -> &[RuleSpec] {
        &self.rules
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Merge the permitted parts of `new` into a copy of `old`.
    ///
    /// Neither input is modified.
    ///
    /// # Errors
    ///
    /// - [`PatchRulesError::StructuralTypeMismatch`] if exactly one root is
    ///   an array. Nothing is cloned or written.
    /// - [`PatchRulesError::MalformedDocument`] if `new` nests deeper than
    ///   [`Options::max_depth`].
    ///
    /// # Example
    /// ```
    /// use patch_rules::PatchRules;
    /// use serde_json::json;
    ///
    /// let rules = PatchRules::new(["user.contacts[:replace:]"]).unwrap();
    /// let out = rules
    ///     .apply(&json!({"user": {"contacts": ["a", "b", "c"]}}), &json!({"user": {"contacts": ["d"]}}))
    ///     .unwrap();
    ///
    /// assert_eq!(out.patched_document, json!({"user": {"contacts": ["d"]}}));
    /// assert_eq!(out.success_paths, vec!["user.contacts"]);
    /// assert!(out.fully_patched);
    /// ```
    pub fn apply(&self, old: &Value, new: &Value) -> Result<PatchOutcome, PatchRulesError> {
        engine::check_root_kinds(old, new)?;
        let paths = self.leaf_paths(new)?;
        let verdicts = engine::resolve(&paths, &self.rules, new);
        Ok(engine::patch(old, new, &verdicts))
    }

    /// Like [`apply`](Self::apply), but also returns every verdict and
    /// per-phase timings.
    pub fn apply_verbose(&self, old: &Value, new: &Value) -> Result<ApplyReport, PatchRulesError> {
        let started = Instant::now();
        engine::check_root_kinds(old, new)?;

        let phase = Instant::now();
        let paths = self.leaf_paths(new)?;
        let enumerate = phase.elapsed();

        let phase = Instant::now();
        let verdicts = engine::resolve(&paths, &self.rules, new);
        let resolve = phase.elapsed();

        let phase = Instant::now();
        let outcome = engine::patch(old, new, &verdicts);
        let patch = phase.elapsed();

        let metrics = ApplyMetrics {
            total: started.elapsed(),
            enumerate,
            resolve,
            patch,
            leaf_paths: paths.len(),
            verdicts: verdicts.len(),
        };

        Ok(ApplyReport { outcome, verdicts: self.summarize(&verdicts), metrics })
    }

    fn leaf_paths(&self, new: &Value) -> Result<Vec<String>, PatchRulesError> {
        engine::leaf_paths(new, self.options.max_depth).collect()
    }

    fn summarize(&self, verdicts: &VerdictMap) -> Vec<VerdictSummary> {
        verdicts
            .iter()
            .map(|(path, verdict)| VerdictSummary {
                path: if path == EMPTY_ROOT_ARRAY { ROOT_PATH.to_string() } else { path.to_string() },
                allowed: verdict.allowed,
                rule: verdict.rule.and_then(|id| self.rules.get(id)).map(|rule| rule.source().to_string()),
            })
            .collect()
    }
}

/// Shorthand for [`PatchRules::new`].
pub fn patch_rules<I, S>(rules: I) -> Result<PatchRules, PatchRulesError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    PatchRules::new(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_default_and_builder() {
        assert_eq!(Options::default().max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(Options::default().with_max_depth(4).max_depth, 4);
    }

    #[test]
    fn rules_keep_declared_order() {
        let engine = patch_rules(["b", "a", "c[:replace:]"]).unwrap();
        let sources: Vec<&str> = engine.rules().iter().map(RuleSpec::source).collect();
        assert_eq!(sources, vec!["b", "a", "c[:replace:]"]);
    }

    #[test]
    fn first_malformed_rule_fails_construction() {
        let err = PatchRules::new(["ok", "bad[", "{worse"]).unwrap_err();
        assert_eq!(
            err,
            PatchRulesError::MalformedRule { rule: "bad[".into(), reason: "unbalanced '['".into() }
        );
    }

    #[test]
    fn apply_verbose_reports_verdicts_and_metrics() {
        let engine = PatchRules::new(["user.name"]).unwrap();
        let old = json!({"user": {"name": "a"}});
        let new = json!({"user": {"name": "b", "role": "x"}});
        let report = engine.apply_verbose(&old, &new).unwrap();

        assert_eq!(
            report.verdicts,
            vec![
                VerdictSummary { path: "user.name".into(), allowed: true, rule: Some("user.name".into()) },
                VerdictSummary { path: "user.role".into(), allowed: false, rule: None },
            ]
        );
        assert_eq!(report.metrics.leaf_paths, 2);
        assert_eq!(report.metrics.verdicts, 2);
        assert!(report.metrics.total >= report.metrics.resolve);
        assert_eq!(report.outcome, engine.apply(&old, &new).unwrap());
    }

    #[test]
    fn apply_verbose_reports_placeholder_as_root() {
        let engine = PatchRules::new(["[*]"]).unwrap();
        let report = engine.apply_verbose(&json!([1, 2]), &json!([])).unwrap();
        assert_eq!(report.verdicts[0].path, "");
        assert_eq!(report.outcome.patched_document, json!([]));
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PatchRules>();
    }
}
