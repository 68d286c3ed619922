//! OpenAPI schema lookups used to check patch field paths.

use serde_json::Value;

use super::fieldpath::{self, Segment};

/// Structural schema of a resource type, as found in a CRD's `openAPIV3Schema`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    root: Value,
}

impl FieldSchema {
    /// Wraps an `openAPIV3Schema` document.
    ///
    /// Returns `None` if the document is not a JSON object.
    #[must_use]
    pub fn new(root: Value) -> Option<Self> {
        root.is_object().then_some(Self { root })
    }

    /// Returns true if `path` names a field the schema allows.
    ///
    /// `metadata` is always accepted since CRD schemas leave it open.
    /// Subtrees marked `x-kubernetes-preserve-unknown-fields` or with
    /// `additionalProperties` accept any continuation.
    #[must_use]
    pub fn accepts(&self, path: &str) -> bool {
        let Some(segments) = fieldpath::parse(path) else {
            return false;
        };
        if matches!(segments.first(), Some(Segment::Field(f)) if f == "metadata") {
            return true;
        }

        let mut node = &self.root;
        for segment in &segments {
            if is_open(node) {
                return true;
            }
            let next = match segment {
                Segment::Field(name) => node
                    .get("properties")
                    .and_then(|p| p.get(name.as_str()))
                    .or_else(|| node.get("additionalProperties").filter(|v| v.is_object())),
                Segment::Index(_) => node.get("items"),
            };
            match next {
                Some(child) => node = child,
                None => return false,
            }
        }
        true
    }
}

fn is_open(node: &Value) -> bool {
    node.get("x-kubernetes-preserve-unknown-fields")
        .and_then(Value::as_bool)
        .unwrap_or(false)
        || node.get("additionalProperties").and_then(Value::as_bool) == Some(true)
}
