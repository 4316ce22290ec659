//! Path-addressed access to JSON documents.
//!
//! Paths use the same canonical notation the enumerator produces: `.key` for
//! object members and `[n]` for array indices, e.g. `user.contacts[0].label`.
//! The empty path addresses the document root.
//!
//! Keys containing `.` or `[` cannot be addressed; callers get a
//! [`TreeError`] (or `None` from [`get`]) rather than a write to the wrong
//! location.

use crate::error::TreeError;
use serde_json::{Map, Value};

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Split a canonical path into segments.
pub fn parse_path(path: &str) -> Result<Vec<Segment>, TreeError> {
    let mut segments = Vec::new();
    if path.is_empty() {
        return Ok(segments);
    }

    for (n, part) in path.split('.').enumerate() {
        let (name, mut rest) = match part.find('[') {
            Some(at) => part.split_at(at),
            None => (part, ""),
        };

        // Only the first part may start with an index (root arrays).
        if name.is_empty() && (n > 0 || rest.is_empty()) {
            return Err(TreeError::EmptySegment(path.to_string()));
        }
        if !name.is_empty() {
            if name.contains(']') {
                return Err(TreeError::InvalidIndex { path: path.to_string(), index: name.to_string() });
            }
            segments.push(Segment::Key(name.to_string()));
        }

        while !rest.is_empty() {
            let Some(body) = rest.strip_prefix('[') else {
                return Err(TreeError::InvalidIndex { path: path.to_string(), index: rest.to_string() });
            };
            let Some(close) = body.find(']') else {
                return Err(TreeError::UnclosedIndex(path.to_string()));
            };
            let digits = &body[..close];
            let index = digits
                .parse::<usize>()
                .ok()
                .filter(|_| digits.bytes().all(|b| b.is_ascii_digit()))
                .ok_or_else(|| TreeError::InvalidIndex { path: path.to_string(), index: digits.to_string() })?;
            segments.push(Segment::Index(index));
            rest = &body[close + 1..];
        }
    }

    Ok(segments)
}

/// Value at `path`, or `None` when the path is absent or cannot be parsed.
pub fn get<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    document.pointer(&json_pointer(&parse_path(path).ok()?))
}

/// RFC 6901 pointer for `segments` (`""` for the root).
pub fn json_pointer(segments: &[Segment]) -> String {
    segments.iter().fold(String::new(), |mut pointer, segment| {
        pointer.push('/');
        match segment {
            Segment::Key(key) => pointer.push_str(&key.replace('~', "~0").replace('/', "~1")),
            Segment::Index(index) => pointer.push_str(&index.to_string()),
        }
        pointer
    })
}

/// Write `value` at `path`, creating intermediate containers as needed.
///
/// A node of the wrong kind on the way down is replaced by an empty
/// container of the right kind; arrays are padded with `null` up to the
/// target index.
pub fn set(document: &mut Value, path: &str, value: Value) -> Result<(), TreeError> {
    let segments = parse_path(path)?;
    let mut node = document;
    for segment in &segments {
        node = child_or_insert(node, segment);
    }
    *node = value;
    Ok(())
}

/// Remove the member at `path`, or clear the element at `path` to `null`.
///
/// Array elements are never removed, so sibling indices keep addressing the
/// same elements. Unsetting the root leaves `null`. Returns whether the
/// document changed.
pub fn unset(document: &mut Value, path: &str) -> Result<bool, TreeError> {
    let mut segments = parse_path(path)?;
    let Some(last) = segments.pop() else {
        let changed = !document.is_null();
        *document = Value::Null;
        return Ok(changed);
    };

    Ok(match (document.pointer_mut(&json_pointer(&segments)), last) {
        (Some(Value::Object(map)), Segment::Key(key)) => map.shift_remove(&key).is_some(),
        (Some(Value::Array(items)), Segment::Index(index)) => match items.get_mut(index) {
            Some(item) if !item.is_null() => {
                *item = Value::Null;
                true
            }
            _ => false,
        },
        _ => false,
    })
}

fn child_or_insert<'a>(node: &'a mut Value, segment: &Segment) -> &'a mut Value {
    match segment {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            // Indexing an object by a missing key inserts `null`.
            &mut node[key.as_str()]
        }
        Segment::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            if let Value::Array(items) = &mut *node {
                if items.len() <= *index {
                    items.resize(*index + 1, Value::Null);
                }
            }
            &mut node[*index]
        }
    }
}
