//! dot-path addressing into nested JSON values
//!
//! a dot-path like `b.c.1` is split on `.` into segments. when the current
//! container is an object a segment is a key; when it is an array the segment
//! must parse as a non-negative index. all key-vs-index decisions live in
//! [`Segment`] so lookup, insertion and removal agree.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

/// error returned when a dot-path cannot be followed for writing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("'{segment}' is not a list index")]
    NotAnIndex { segment: String },
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot descend into a scalar value at '{segment}'")]
    NotAContainer { segment: String },
}

/// parsed dot-path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DotPath {
    segments: Vec<String>,
}

impl DotPath {
    /// split a dot-path into segments
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    /// look up the value at this path, descending through objects only
    ///
    /// returns `None` when a key is missing or an intermediate value is not an
    /// object. a JSON `null` stored at the path is returned as `Some(Null)`.
    pub fn get<'a>(&self, target: &'a Value) -> Option<&'a Value> {
        let mut current = target;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// set `value` at this path, creating intermediate objects as needed
    ///
    /// a scalar sitting where the path needs to descend is replaced by a new
    /// object. the final segment overwrites an object key, or inserts before
    /// the given index when the parent is an array (clamped to the end).
    pub fn put(&self, target: &mut Value, value: Value) -> Result<(), PathError> {
        let segments: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        put_at(target, &segments, value)
    }

    /// remove the value at this path
    ///
    /// missing paths are a no-op. when the removal leaves its parent container
    /// empty, that container is removed from its own parent, cascading up to
    /// (but never including) the root. returns whether anything was removed.
    pub fn remove(&self, target: &mut Value) -> bool {
        let segments: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        remove_at(target, &segments)
    }
}

impl FromStr for DotPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self::parse(s))
    }
}

impl fmt::Display for DotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// a single path segment resolved against a concrete container
enum Segment<'s> {
    Key(&'s str),
    Index(usize),
}

impl<'s> Segment<'s> {
    fn resolve(segment: &'s str, container: &Value) -> Result<Self, PathError> {
        match container {
            Value::Array(_) => parse_index(segment).map(Segment::Index),
            Value::Object(_) => Ok(Segment::Key(segment)),
            _ => Err(PathError::NotAContainer {
                segment: segment.to_string(),
            }),
        }
    }
}

fn parse_index(segment: &str) -> Result<usize, PathError> {
    segment.parse::<usize>().map_err(|_| PathError::NotAnIndex {
        segment: segment.to_string(),
    })
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match Segment::resolve(segment, node).ok()? {
        Segment::Key(key) => node.as_object_mut()?.get_mut(key),
        Segment::Index(index) => node.as_array_mut()?.get_mut(index),
    }
}

fn remove_child(node: &mut Value, segment: &str) -> bool {
    match (Segment::resolve(segment, node), node) {
        (Ok(Segment::Key(key)), Value::Object(map)) => map.shift_remove(key).is_some(),
        (Ok(Segment::Index(index)), Value::Array(items)) if index < items.len() => {
            items.remove(index);
            true
        }
        _ => false,
    }
}

fn put_at(node: &mut Value, segments: &[&str], value: Value) -> Result<(), PathError> {
    let (head, rest) = segments.split_first().ok_or(PathError::Empty)?;

    let child = match node {
        Value::Object(map) => {
            if rest.is_empty() {
                map.insert(head.to_string(), value);
                return Ok(());
            }
            map.entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
        }
        Value::Array(items) => {
            let index = parse_index(head)?;
            if rest.is_empty() {
                let index = index.min(items.len());
                items.insert(index, value);
                return Ok(());
            }
            let len = items.len();
            items
                .get_mut(index)
                .ok_or(PathError::IndexOutOfRange { index, len })?
        }
        _ => {
            return Err(PathError::NotAContainer {
                segment: head.to_string(),
            })
        }
    };

    if !is_container(child) {
        *child = Value::Object(Map::new());
    }

    put_at(child, rest, value)
}

fn remove_at(node: &mut Value, segments: &[&str]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return false;
    };

    if rest.is_empty() {
        return remove_child(node, head);
    }

    let Some(child) = child_mut(node, head) else {
        return false;
    };

    let removed = remove_at(child, rest);
    let prune = removed && is_empty_container(child);
    if prune {
        remove_child(node, head);
    }
    removed
}
