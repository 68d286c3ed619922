//! Field path parsing and access on untyped documents.
//!
//! Paths use the Crossplane patch syntax: dot separated fields, numeric
//! indices and bracketed keys, e.g. `spec.forProvider.tags[0].key` or
//! `metadata.labels[crossplane.io/claim-name]`.

use serde_json::{Map, Value};

/// A single path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object field.
    Field(String),
    /// Array index.
    Index(usize),
}

/// Parses a field path into segments.
///
/// Returns `None` for malformed paths (empty segments, unterminated brackets).
#[must_use]
pub fn parse(path: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    let mut after_bracket = false;

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if current.is_empty() && !after_bracket {
                    return None;
                }
                if !current.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut current)));
                }
                after_bracket = false;
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed || inner.is_empty() {
                    return None;
                }
                segments.push(
                    inner
                        .parse::<usize>()
                        .map_or(Segment::Field(inner), Segment::Index),
                );
                after_bracket = true;
            }
            _ => {
                if after_bracket {
                    return None;
                }
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        segments.push(Segment::Field(current));
    } else if !after_bracket {
        return None;
    }

    Some(segments)
}

/// Returns the value at `path`, if present.
#[must_use]
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    parse(path)?.iter().try_fold(root, |value, segment| match segment {
        Segment::Field(name) => value.get(name),
        Segment::Index(i) => value.get(*i),
    })
}

/// Returns the string at `path`, if present.
#[must_use]
pub fn get_str<'a>(root: &'a Value, path: &str) -> Option<&'a str> {
    get(root, path).and_then(Value::as_str)
}

/// Sets `value` at `path`, creating intermediate objects as needed.
///
/// Returns `false` if the path is malformed or crosses a non-object value
/// or an out-of-range index.
pub fn set(root: &mut Value, path: &str, value: Value) -> bool {
    let Some(segments) = parse(path) else {
        return false;
    };
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        current = match segment {
            Segment::Field(name) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                let Some(object) = current.as_object_mut() else {
                    return false;
                };
                object.entry(name.clone()).or_insert(Value::Null)
            }
            Segment::Index(i) => match current.get_mut(*i) {
                Some(v) => v,
                None => return false,
            },
        };
    }

    match last {
        Segment::Field(name) => {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            match current.as_object_mut() {
                Some(object) => {
                    object.insert(name.clone(), value);
                    true
                }
                None => false,
            }
        }
        Segment::Index(i) => match current.get_mut(*i) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        },
    }
}
