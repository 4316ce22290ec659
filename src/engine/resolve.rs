//! Permission resolution.
//!
//! Turns the enumerated leaf paths of the candidate document and the
//! compiled rules into a [`VerdictMap`]: one verdict per *effective path*.
//! The effective path is the leaf path itself for leaf rules, and the scope
//! path (or the concrete prefix a scope pattern matched) for scope rules.
//!
//! ```text
//! for rule in rules (declared order)
//!   leaf rule            -> every accepted leaf path       = allow/deny
//!   literal scope rule   -> scope path (if present in new) = allow/deny
//!   pattern scope rule   -> matched prefix of each leaf    = allow/deny
//! then
//!   every leaf not at or below a written key               = default deny
//! ```
//!
//! Later writes replace earlier ones, so a rule placed after another
//! overrides it over the whole subtree it names:
//!
//! - a scope written over earlier verdicts beneath it drops them;
//! - a path written beneath an earlier scope splits that scope into its
//!   remaining leaves, which keep the scope's decision as plain leaf writes.
//!
//! No key in the map is therefore an ancestor of another, and each patch
//! write touches its own subtree. Keys keep the position of their first
//! write.

use super::compiled_rules::RuleSpec;
use super::tree;
use crate::{EMPTY_ROOT_ARRAY, ROOT_PATH, Verdict, WriteMode};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Path a rule must accept to also authorize clearing an empty root array.
const ROOT_ELEMENT_PROBE: &str = "[0]";

/// Insertion-ordered map from effective path to verdict.
#[derive(Debug, Clone, Default)]
pub(crate) struct VerdictMap {
    entries: Vec<(String, Verdict)>,
    index: HashMap<String, usize>,
}

impl VerdictMap {
    /// Record `verdict` for `path`, overriding every earlier verdict at, above
    /// or beneath it. `leaves` are the candidate's leaf paths, used to split
    /// an overridden ancestor scope.
    pub(crate) fn insert(&mut self, path: &str, verdict: Verdict, leaves: &[String]) {
        if let Some(&at) = self.index.get(path) {
            self.entries[at].1 = verdict;
            return;
        }

        if let Some(at) = self.ancestor_of(path) {
            let (scope, inherited) = self.entries[at].clone();
            let mut split = Vec::new();
            let mut placed = false;
            for leaf in leaves.iter().filter(|leaf| is_beneath(leaf, &scope)) {
                if leaf != path && !is_beneath(leaf, path) {
                    split.push((leaf.clone(), inherited.as_leaf()));
                } else if !placed {
                    split.push((path.to_string(), verdict));
                    placed = true;
                }
            }
            if !placed {
                split.push((path.to_string(), verdict));
            }
            trace!(scope = scope.as_str(), path, leaves = split.len(), "split scope verdict");
            self.entries.splice(at..=at, split);
            self.reindex();
            return;
        }

        // Leaf paths never have descendants in the map.
        if verdict.mode != WriteMode::Leaf || path == ROOT_PATH {
            if let Some(first) = self.entries.iter().position(|(key, _)| is_beneath(key, path)) {
                let mut entries = Vec::with_capacity(self.entries.len());
                for (at, entry) in self.entries.drain(..).enumerate() {
                    if at == first {
                        entries.push((path.to_string(), verdict));
                    } else if !is_beneath(&entry.0, path) {
                        entries.push(entry);
                    }
                }
                self.entries = entries;
                self.reindex();
                return;
            }
        }

        self.index.insert(path.to_string(), self.entries.len());
        self.entries.push((path.to_string(), verdict));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, Verdict)> {
        self.entries.iter().map(|(path, verdict)| (path.as_str(), *verdict))
    }

    /// Whether `leaf` or one of its ancestors already has a verdict.
    fn covers(&self, leaf: &str) -> bool {
        self.index.contains_key(leaf) || self.ancestor_of(leaf).is_some()
    }

    /// Position of the entry whose key is a strict ancestor of `path`.
    fn ancestor_of(&self, path: &str) -> Option<usize> {
        if path.is_empty() {
            return None;
        }
        self.index.get(ROOT_PATH).copied().or_else(|| {
            path.char_indices()
                .filter(|&(at, c)| at > 0 && (c == '.' || c == '['))
                .find_map(|(at, _)| self.index.get(&path[..at]).copied())
        })
    }

    fn reindex(&mut self) {
        self.index = self.entries.iter().enumerate().map(|(at, (path, _))| (path.clone(), at)).collect();
    }
}

/// Whether `path` lies strictly beneath `ancestor`.
fn is_beneath(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && matches!(path.as_bytes()[ancestor.len()], b'.' | b'[')
}

/// Build the verdict map for `paths` (enumerated from `candidate`).
pub(crate) fn resolve(paths: &[String], rules: &[RuleSpec], candidate: &Value) -> VerdictMap {
    let mut verdicts = VerdictMap::default();

    for (id, rule) in rules.iter().enumerate() {
        let verdict = Verdict::from_rule(rule, id);

        if let Some(scope) = rule.literal_scope() {
            // Scope rules authorize their subtree as a unit; the leaves under
            // it do not need to match.
            if tree::get(candidate, scope).is_some() {
                trace!(rule = rule.source(), path = scope, allowed = verdict.allowed, "scope verdict");
                verdicts.insert(scope, verdict, paths);
            }
            continue;
        }

        for path in paths {
            let effective = if rule.whole_replace() { scope_target(rule, path) } else { leaf_target(rule, path) };
            if let Some(effective) = effective {
                trace!(rule = rule.source(), path = effective, allowed = verdict.allowed, "verdict");
                verdicts.insert(effective, verdict, paths);
            }
        }
    }

    let mut denied_by_default = 0usize;
    for path in paths {
        if !verdicts.covers(path) {
            verdicts.insert(path, Verdict::default_deny(), paths);
            denied_by_default += 1;
        }
    }

    debug!(
        leaf_paths = paths.len(),
        rules = rules.len(),
        verdicts = verdicts.len(),
        denied_by_default,
        "resolved permissions"
    );
    verdicts
}

fn leaf_target<'p>(rule: &RuleSpec, path: &'p str) -> Option<&'p str> {
    let accepted = if path == EMPTY_ROOT_ARRAY {
        rule.matches(EMPTY_ROOT_ARRAY) || rule.matches(ROOT_ELEMENT_PROBE)
    } else {
        rule.matches(path)
    };
    accepted.then_some(path)
}

fn scope_target<'p>(rule: &RuleSpec, path: &'p str) -> Option<&'p str> {
    if path == EMPTY_ROOT_ARRAY {
        return rule.matches(ROOT_ELEMENT_PROBE).then_some(path);
    }
    rule.scope_prefix(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::leaf_paths;
    use serde_json::json;

    fn run(rules: &[&str], candidate: &Value) -> Vec<(String, bool, Option<usize>)> {
        let rules: Vec<RuleSpec> = rules.iter().map(|r| RuleSpec::compile(r).unwrap()).collect();
        let paths: Vec<String> = leaf_paths(candidate, 64).collect::<Result<_, _>>().unwrap();
        resolve(&paths, &rules, candidate)
            .iter()
            .map(|(path, verdict)| (path.to_string(), verdict.allowed, verdict.rule))
            .collect()
    }

    #[test]
    fn leaf_rule_allows_only_matching_paths() {
        let doc = json!({"user": {"name": "x", "email": "y"}});
        assert_eq!(
            run(&["user.name"], &doc),
            vec![("user.name".into(), true, Some(0)), ("user.email".into(), false, None)]
        );
    }

    #[test]
    fn later_rule_wins() {
        let doc = json!({"user": {"name": "x"}});
        assert_eq!(run(&["user.name", "!user.name"], &doc), vec![("user.name".into(), false, Some(1))]);
        assert_eq!(run(&["!user.*", "user.name"], &doc), vec![("user.name".into(), true, Some(1))]);
    }

    #[test]
    fn non_matching_rule_leaves_verdict_alone() {
        let doc = json!({"a": 1, "b": 2});
        assert_eq!(run(&["a", "b"], &doc), vec![("a".into(), true, Some(0)), ("b".into(), true, Some(1))]);
    }

    #[test]
    fn literal_scope_covers_its_leaves() {
        let doc = json!({"user": {"contacts": ["d", "e"], "name": "x"}});
        assert_eq!(
            run(&["user.contacts[:replace:]"], &doc),
            vec![("user.contacts".into(), true, Some(0)), ("user.name".into(), false, None)]
        );
    }

    #[test]
    fn literal_scope_needs_a_value_in_the_candidate() {
        let doc = json!({"user": {"name": "x"}});
        assert_eq!(run(&["user.tags[:unique:]"], &doc), vec![("user.name".into(), false, None)]);
    }

    #[test]
    fn literal_scope_grants_empty_arrays() {
        let doc = json!({"user": {"tags": []}});
        assert_eq!(run(&["user.tags[:replace:]"], &doc), vec![("user.tags".into(), true, Some(0))]);
    }

    #[test]
    fn pattern_scope_uses_matched_prefix() {
        let doc = json!({"users": [{"tags": ["a"]}, {"tags": ["b", "c"], "name": "n"}]});
        assert_eq!(
            run(&["users[*].tags[:unique:]"], &doc),
            vec![
                ("users[0].tags".into(), true, Some(0)),
                ("users[1].tags".into(), true, Some(0)),
                ("users[1].name".into(), false, None),
            ]
        );
    }

    #[test]
    fn denied_scope_hides_its_leaves() {
        let doc = json!({"user": {"tags": ["a", "b"]}});
        assert_eq!(run(&["!user.tags[:replace:]"], &doc), vec![("user.tags".into(), false, Some(0))]);
    }

    #[test]
    fn empty_root_array_placeholder() {
        let doc = json!([]);
        assert_eq!(run(&["[*]"], &doc), vec![(EMPTY_ROOT_ARRAY.into(), true, Some(0))]);
        assert_eq!(run(&["*"], &doc), vec![(EMPTY_ROOT_ARRAY.into(), true, Some(0))]);
        assert_eq!(run(&["user.name"], &doc), vec![(EMPTY_ROOT_ARRAY.into(), false, None)]);
        assert_eq!(run(&["[:replace:]"], &doc), vec![(ROOT_PATH.into(), true, Some(0))]);
    }

    #[test]
    fn later_scope_drops_earlier_leaves_beneath_it() {
        let doc = json!({"user": {"name": "x", "tags": ["a", "b"]}});
        assert_eq!(
            run(&["user.*", "!user.tags[:replace:]"], &doc),
            vec![("user.name".into(), true, Some(0)), ("user.tags".into(), false, Some(1))]
        );
    }

    #[test]
    fn later_leaf_splits_earlier_scope() {
        let doc = json!({"user": {"tags": ["a", "a"]}});
        assert_eq!(
            run(&["user.tags[:unique:]", "user.*"], &doc),
            vec![("user.tags[0]".into(), true, Some(1)), ("user.tags[1]".into(), true, Some(1))]
        );

        let doc = json!({"user": {"tags": ["a", "b", "c"]}});
        assert_eq!(
            run(&["user.tags[:replace:]", "!user.tags[1]"], &doc),
            vec![
                ("user.tags[0]".into(), true, Some(0)),
                ("user.tags[1]".into(), false, Some(1)),
                ("user.tags[2]".into(), true, Some(0)),
            ]
        );
    }

    #[test]
    fn split_leaves_become_plain_leaf_writes() {
        let rules = vec![RuleSpec::compile("[:replace:]").unwrap(), RuleSpec::compile("!b").unwrap()];
        let doc = json!({"a": 1, "b": 2});
        let paths: Vec<String> = leaf_paths(&doc, 64).collect::<Result<_, _>>().unwrap();

        assert_eq!(
            resolve(&paths, &rules, &doc).iter().collect::<Vec<_>>(),
            vec![
                ("a", Verdict { allowed: true, rule: Some(0), mode: WriteMode::Leaf }),
                ("b", Verdict { allowed: false, rule: Some(1), mode: WriteMode::Leaf }),
            ]
        );
    }

    #[test]
    fn insert_overwrites_in_place() {
        let leaf = |allowed, rule| Verdict { allowed, rule: Some(rule), mode: WriteMode::Leaf };
        let mut map = VerdictMap::default();
        map.insert("a", leaf(true, 0), &[]);
        map.insert("b", leaf(true, 1), &[]);
        map.insert("a", leaf(false, 2), &[]);

        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("a", leaf(false, 2)), ("b", leaf(true, 1))]);
    }

    #[test]
    fn covers_checks_ancestors_at_segment_boundaries() {
        let mut map = VerdictMap::default();
        map.insert("user.tags", Verdict::default_deny(), &[]);

        assert!(map.covers("user.tags"));
        assert!(map.covers("user.tags[0]"));
        assert!(map.covers("user.tags.x"));
        assert!(!map.covers("user.tagsX"));
        assert!(!map.covers("user"));
    }

    #[test]
    fn beneath_respects_segment_boundaries() {
        assert!(is_beneath("a.b", "a"));
        assert!(is_beneath("a[0]", "a"));
        assert!(is_beneath("[0]", ""));
        assert!(!is_beneath("ab", "a"));
        assert!(!is_beneath("a", "a"));
        assert!(!is_beneath("", ""));
    }
}
