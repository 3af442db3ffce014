//! Attribute path addressing over nested JSON input.
//!
//! Paths are dot-joined (`items.0.qty`); bracket notation (`items[0].qty`,
//! `items[*].qty`) is accepted and normalized to dots. A `*` segment is a
//! wildcard that expands over every index of the sequence it addresses.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Concrete indices substituted for each `*` of a wildcard path, left to right.
pub type WildcardBinding = Vec<usize>;

/// Flattens a nested object into dot-joined leaf paths.
///
/// Arrays are leaves. An empty object is recorded as an empty-object marker so
/// "present but empty" stays distinguishable from absent. A non-object root
/// flattens to nothing.
pub fn flatten(value: &Value) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    if let Value::Object(map) = value {
        flatten_into(map, None, &mut out);
    }
    out
}

fn flatten_into(map: &Map<String, Value>, prefix: Option<&str>, out: &mut IndexMap<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(child) if !child.is_empty() => flatten_into(child, Some(&path), out),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Rewrites bracket segments to dot segments and strips a leading dot.
///
/// `a[0].b` becomes `a.0.b`, `a[*]` becomes `a.*`. Brackets that do not hold a
/// word or `*` are left untouched.
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if !path.contains('[') && !path.starts_with('.') {
        return Cow::Borrowed(path);
    }

    let mut out = String::with_capacity(path.len() + 2);
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        if c != '[' {
            out.push(c);
            continue;
        }
        let mut inner = String::new();
        let mut closed = false;
        for n in chars.by_ref() {
            if n == ']' {
                closed = true;
                break;
            }
            inner.push(n);
        }
        if closed && is_bracket_segment(&inner) {
            out.push('.');
            out.push_str(&inner);
        } else {
            out.push('[');
            out.push_str(&inner);
            if closed {
                out.push(']');
            }
        }
    }

    match out.strip_prefix('.') {
        Some(stripped) => Cow::Owned(stripped.to_string()),
        None => Cow::Owned(out),
    }
}

fn is_bracket_segment(inner: &str) -> bool {
    inner == "*" || (!inner.is_empty() && inner.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// Resolves `path` against `root`.
///
/// A literal top-level key wins, so keys that contain dots stay addressable.
/// Otherwise the path is walked segment by segment; array segments must be
/// decimal indices. Returns `None` (absent) as soon as a segment is missing or
/// an intermediate value is not a container. A present `null` resolves to
/// `Some(&Value::Null)`.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if let Value::Object(map) = root {
        if let Some(value) = map.get(path) {
            return Some(value);
        }
    }

    let path = normalize_path(path);
    let mut current = root;
    for segment in path.split('.') {
        current = child(current, segment)?;
    }
    Some(current)
}

/// Existence probe: whether `path` is present in `root`, whatever its value.
pub fn contains(root: &Value, path: &str) -> bool {
    resolve(root, path).is_some()
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => parse_index(segment).and_then(|i| items.get(i)),
        _ => None,
    }
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Expands every `*` in `pattern` against the sequences found in `root`.
///
/// Each result is a concrete path with its [`WildcardBinding`]. The first `*`
/// is expanded over the sequence its prefix resolves to, then the next `*` of
/// each concrete path, and so on. A prefix that is absent or not an array
/// yields nothing. A pattern without `*` yields itself with an empty binding.
pub fn expand_wildcards(root: &Value, pattern: &str) -> Vec<(String, WildcardBinding)> {
    let pattern = normalize_path(pattern);
    let mut out = Vec::new();
    expand_into(root, &pattern, Vec::new(), &mut out);
    out
}

fn expand_into(
    root: &Value,
    pattern: &str,
    binding: WildcardBinding,
    out: &mut Vec<(String, WildcardBinding)>,
) {
    let Some(star) = pattern.find('*') else {
        out.push((pattern.to_string(), binding));
        return;
    };

    let prefix = pattern[..star].trim_end_matches('.');
    let parent = if prefix.is_empty() {
        Some(root)
    } else {
        resolve(root, prefix)
    };
    let Some(Value::Array(items)) = parent else {
        return;
    };

    for index in 0..items.len() {
        let concrete = format!("{}{}{}", &pattern[..star], index, &pattern[star + 1..]);
        let mut next = binding.clone();
        next.push(index);
        expand_into(root, &concrete, next, out);
    }
}

/// Replaces `*` occurrences in `text` with the bound indices, left to right.
///
/// Extra `*` beyond the binding are left in place.
pub fn substitute_wildcards(text: &str, binding: &[usize]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut indices = binding.iter();
    for c in text.chars() {
        if c == '*' {
            if let Some(index) = indices.next() {
                out.push_str(&index.to_string());
                continue;
            }
        }
        out.push(c);
    }
    out
}
