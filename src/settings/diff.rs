//! Structural diff of JSON documents.

use serde_json::Value;
use std::fmt;

/// Kind of difference at a path.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// Present only on the right side.
    Added(Value),
    /// Present only on the left side.
    Removed(Value),
    /// Present on both sides with different values.
    Changed { old: Value, new: Value },
}

/// One difference between two documents.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonChange {
    /// `/`-joined object keys; empty for the document root.
    pub path: String,
    pub kind: ChangeKind,
}

impl fmt::Display for JsonChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        match &self.kind {
            ChangeKind::Added(v) => write!(f, "+ {}: {}", path, v),
            ChangeKind::Removed(v) => write!(f, "- {}: {}", path, v),
            ChangeKind::Changed { old, new } => write!(f, "~ {}: {} -> {}", path, old, new),
        }
    }
}

/// Lists the differences from `left` to `right`.
///
/// Objects are compared key by key, recursively; any other value is
/// compared whole. Within each object, removed and changed keys come
/// first in `left` key order, then added keys in `right` key order.
#[must_use]
pub fn diff_values(left: &Value, right: &Value) -> Vec<JsonChange> {
    let mut changes = Vec::new();
    diff_at(String::new(), left, right, &mut changes);
    changes
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", path, key)
    }
}

fn diff_at(path: String, left: &Value, right: &Value, changes: &mut Vec<JsonChange>) {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            for (key, lv) in l {
                match r.get(key) {
                    Some(rv) => diff_at(join(&path, key), lv, rv, changes),
                    None => changes.push(JsonChange {
                        path: join(&path, key),
                        kind: ChangeKind::Removed(lv.clone()),
                    }),
                }
            }
            for (key, rv) in r {
                if !l.contains_key(key) {
                    changes.push(JsonChange {
                        path: join(&path, key),
                        kind: ChangeKind::Added(rv.clone()),
                    });
                }
            }
        }
        _ if left != right => changes.push(JsonChange {
            path,
            kind: ChangeKind::Changed {
                old: left.clone(),
                new: right.clone(),
            },
        }),
        _ => {}
    }
}
