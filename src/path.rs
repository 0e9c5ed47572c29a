//! Dot/bracket paths into nested form trees and the copy-on-write accessors
//! built on them.
//!
//! `set_in` copies only the containers along the written path; siblings keep
//! their allocation, so comparing any sub-tree of the old and new roots with
//! [`Value::same`] tells whether something below it changed.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use crate::value::{Value, ValueMap};

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Vec<String>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parses `friends[0].name`, `a["b.c"]` and `a.0.b` style paths.
    ///
    /// Consecutive, leading or trailing dots produce empty segments.
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut after_bracket = false;
        let mut chars = input.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '.' => {
                    if !(after_bracket && current.is_empty()) {
                        segments.push(std::mem::take(&mut current));
                    }
                    after_bracket = false;
                    if chars.peek().is_none() {
                        segments.push(String::new());
                    }
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                    segments.push(read_bracket(&mut chars));
                    after_bracket = true;
                }
                _ => {
                    current.push(ch);
                    after_bracket = false;
                }
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        Self(segments)
    }

    pub fn from_segments<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(key.into());
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(index.to_string());
        self
    }

    pub fn join(mut self, other: &Path) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn read_bracket(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut segment = String::new();
    let quote = match chars.peek() {
        Some(&q @ ('"' | '\'')) => {
            chars.next();
            Some(q)
        }
        _ => None,
    };

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(_), '\\') => {
                if let Some(escaped) = chars.next() {
                    segment.push(escaped);
                }
            }
            (Some(q), c) if c == q => {
                if chars.peek() == Some(&']') {
                    chars.next();
                }
                return segment;
            }
            (None, ']') => return segment,
            (_, c) => segment.push(c),
        }
    }
    segment
}

/// Interprets a segment as an array index: a canonical non-negative integer.
pub fn as_index(segment: &str) -> Option<usize> {
    let canonical = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if canonical { segment.parse().ok() } else { None }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(Path::parse(input))
    }
}

impl From<&str> for Path {
    fn from(input: &str) -> Self {
        Path::parse(input)
    }
}

impl From<String> for Path {
    fn from(input: String) -> Self {
        Path::parse(&input)
    }
}

impl From<&String> for Path {
    fn from(input: &String) -> Self {
        Path::parse(input)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            if as_index(segment).is_some() {
                write!(f, "[{segment}]")?;
            } else if segment.contains(['.', '[', ']']) {
                write!(f, "[\"{}\"]", segment.replace('"', "\\\""))?;
            } else if position == 0 {
                f.write_str(segment)?;
            } else {
                write!(f, ".{segment}")?;
            }
        }
        Ok(())
    }
}

/// Walks `path` from `root`. Scalars along the way end the walk with `None`.
pub fn get_in<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = match current {
            Value::Map(entries) => entries.get(segment)?,
            Value::List(items) => items.get(as_index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Like [`get_in`], falling back to `default` only when nothing is stored.
/// An explicit `Null` at the end of the path is returned as is.
pub fn get_in_or<'a>(root: &'a Value, path: &Path, default: &'a Value) -> &'a Value {
    get_in(root, path).unwrap_or(default)
}

/// Returns a new root with `value` written at `path`, or with the entry
/// removed when `value` is `None`.
///
/// When the stored leaf is already [`Value::same`] as `value` the original
/// root is returned unchanged. Missing or scalar intermediates are replaced
/// by a fresh list when the next segment is an index, otherwise by a map.
pub fn set_in(root: &Value, path: &Path, value: Option<Value>) -> Value {
    if path.is_root() {
        return match value {
            Some(value) if !value.same(root) => value,
            _ => root.clone(),
        };
    }
    write(Some(root), path.segments(), value).unwrap_or_else(|| root.clone())
}

pub fn delete_in(root: &Value, path: &Path) -> Value {
    set_in(root, path, None)
}

fn same_slot(existing: Option<&Value>, next: Option<&Value>) -> bool {
    match (existing, next) {
        (None, None) => true,
        (Some(existing), Some(next)) => existing.same(next),
        _ => false,
    }
}

// `None` means the subtree is unchanged.
fn write(node: Option<&Value>, segments: &[String], value: Option<Value>) -> Option<Value> {
    let (head, rest) = segments.split_first()?;

    let container = match node {
        Some(Value::List(items)) if as_index(head).is_none() => Value::Map(Arc::new(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item.clone()))
                .collect(),
        )),
        Some(existing @ (Value::List(_) | Value::Map(_))) => existing.clone(),
        _ if as_index(head).is_some() => Value::list(),
        _ => Value::map(),
    };

    match container {
        Value::List(items) => {
            let index = as_index(head)?;
            let child = items.get(index);
            let next = if rest.is_empty() {
                if same_slot(child, value.as_ref()) {
                    return None;
                }
                value
            } else {
                Some(write(child, rest, value)?)
            };

            let mut items = Arc::unwrap_or_clone(items);
            match next {
                Some(next) => {
                    if index >= items.len() {
                        items.resize(index, Value::Null);
                        items.push(next);
                    } else {
                        items[index] = next;
                    }
                }
                None => {
                    if let Some(slot) = items.get_mut(index) {
                        *slot = Value::Null;
                    }
                }
            }
            Some(Value::List(Arc::new(items)))
        }
        Value::Map(entries) => {
            let child = entries.get(head);
            let next = if rest.is_empty() {
                if same_slot(child, value.as_ref()) {
                    return None;
                }
                value
            } else {
                Some(write(child, rest, value)?)
            };

            let mut entries: ValueMap = Arc::unwrap_or_clone(entries);
            match next {
                Some(next) => {
                    entries.insert(head.clone(), next);
                }
                None => {
                    entries.remove(head);
                }
            }
            Some(Value::Map(Arc::new(entries)))
        }
        _ => None,
    }
}
