//! Leaf-path enumeration.
//!
//! Walks a document depth-first and yields the canonical path of every
//! scalar value: object members in document order, array elements by
//! ascending index. Containers are descended into but never yielded.
//!
//! The walk keeps its own stack of container iterators instead of
//! recursing, and refuses to descend past `max_depth` nested containers.
//!
//! ```text
//! {"user": {"name": "x", "tags": ["a", "b"]}}
//!   -> user.name, user.tags[0], user.tags[1]
//! ```

use crate::error::PatchRulesError;
use crate::{EMPTY_ROOT_ARRAY, ROOT_PATH};
use serde_json::Value;

/// Enumerate the leaf paths of `document`.
///
/// An empty root array yields the single placeholder [`EMPTY_ROOT_ARRAY`].
/// A scalar root yields the root path (`""`). Each call starts a fresh walk.
pub(crate) fn leaf_paths(document: &Value, max_depth: usize) -> LeafPaths<'_> {
    let mut paths = LeafPaths { stack: Vec::new(), max_depth, pending: None };
    paths.pending = match document {
        Value::Array(items) if items.is_empty() => Some(Ok(EMPTY_ROOT_ARRAY.to_string())),
        _ => paths.descend(ROOT_PATH.to_string(), document),
    };
    paths
}

/// Lazy iterator returned by [`leaf_paths`].
///
/// Yields at most one `Err` (depth exceeded) and then ends.
pub(crate) struct LeafPaths<'a> {
    stack: Vec<Frame<'a>>,
    max_depth: usize,
    pending: Option<Result<String, PatchRulesError>>,
}

enum Frame<'a> {
    Object { prefix: String, members: serde_json::map::Iter<'a> },
    Array { prefix: String, elements: std::iter::Enumerate<std::slice::Iter<'a, Value>> },
}

impl<'a> LeafPaths<'a> {
    /// Yield `value` if it is a scalar, otherwise push a frame for it.
    fn descend(&mut self, path: String, value: &'a Value) -> Option<Result<String, PatchRulesError>> {
        let frame = match value {
            Value::Object(map) => Frame::Object { prefix: path, members: map.iter() },
            Value::Array(items) => Frame::Array { prefix: path, elements: items.iter().enumerate() },
            _ => return Some(Ok(path)),
        };

        if self.stack.len() >= self.max_depth {
            self.stack.clear();
            return Some(Err(PatchRulesError::MalformedDocument { max_depth: self.max_depth }));
        }
        self.stack.push(frame);
        None
    }
}

impl Iterator for LeafPaths<'_> {
    type Item = Result<String, PatchRulesError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.pending.take() {
            return Some(item);
        }

        loop {
            let step = match self.stack.last_mut()? {
                Frame::Object { prefix, members } => members.next().map(|(key, value)| (member_path(prefix, key), value)),
                Frame::Array { prefix, elements } => {
                    elements.next().map(|(index, value)| (format!("{prefix}[{index}]"), value))
                }
            };

            match step {
                Some((path, value)) => {
                    if let Some(item) = self.descend(path, value) {
                        return Some(item);
                    }
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

fn member_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() { key.to_string() } else { format!("{prefix}.{key}") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(document: &Value) -> Vec<String> {
        leaf_paths(document, 64).collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn yields_leaves_depth_first_in_document_order() {
        let doc = json!({
            "user": {
                "name": "Jane",
                "contacts": [{"label": "home", "number": "1"}, {"label": "work"}],
                "active": true
            },
            "version": 2
        });

        assert_eq!(
            collect(&doc),
            vec![
                "user.name",
                "user.contacts[0].label",
                "user.contacts[0].number",
                "user.contacts[1].label",
                "user.active",
                "version",
            ]
        );
    }

    #[test]
    fn containers_are_never_yielded() {
        let doc = json!({"a": {}, "b": [], "c": [[], {"d": null}]});
        assert_eq!(collect(&doc), vec!["c[1].d"]);
    }

    #[test]
    fn root_arrays_use_bare_indices() {
        assert_eq!(collect(&json!([{"a": 1}, 2])), vec!["[0].a", "[1]"]);
    }

    #[test]
    fn empty_root_array_yields_placeholder() {
        assert_eq!(collect(&json!([])), vec![EMPTY_ROOT_ARRAY]);
        assert!(collect(&json!({})).is_empty());
    }

    #[test]
    fn scalar_root_yields_root_path() {
        assert_eq!(collect(&json!("x")), vec![ROOT_PATH]);
    }

    #[test]
    fn each_call_restarts() {
        let doc = json!({"a": 1, "b": 2});
        assert_eq!(collect(&doc), collect(&doc));
    }

    #[test]
    fn depth_limit_yields_one_error() {
        let doc = json!({"a": {"b": {"c": 1}}, "z": 1});
        let items: Vec<_> = leaf_paths(&doc, 2).collect();
        assert_eq!(items, vec![Err(PatchRulesError::MalformedDocument { max_depth: 2 })]);

        assert_eq!(leaf_paths(&doc, 3).filter(Result::is_ok).count(), 2);
    }
}
