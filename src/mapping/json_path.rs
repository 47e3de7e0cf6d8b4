//! Reading values out of the input document.
//!
//! Designs address the document with JSON Pointers (`/data_access/mime_type`) or with the
//! dotted path notation of the data source picker (`$.data_access.mime_type`,
//! `authors[0].name`). Dotted paths are turned into pointers before resolution.

use serde_json::Value;

use crate::core::types::ExtractError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(String),
}

impl PathSegment {
    fn value(&self) -> &str {
        match self {
            PathSegment::Key(v) | PathSegment::Index(v) => v,
        }
    }
}

/// Splits a dotted path (`a.b[0].c`) into segments. A leading `$` segment is kept.
pub fn path_to_segments(path: &str) -> Vec<PathSegment> {
    path.replace(']', "")
        .replace('[', ".[")
        .split('.')
        .filter(|item| !item.is_empty())
        .map(|item| match item.strip_prefix('[') {
            Some(index) => PathSegment::Index(index.to_string()),
            None => PathSegment::Key(item.to_string()),
        })
        .collect()
}

/// Splits a JSON Pointer into segments, prefixed with the `$` root like dotted paths.
pub fn pointer_to_segments(pointer: &str) -> Vec<PathSegment> {
    let mut segments = vec![PathSegment::Key("$".to_string())];
    if pointer.is_empty() {
        return segments;
    }
    let tokens = pointer.strip_prefix('/').unwrap_or(pointer);
    segments.extend(tokens.split('/').map(|item| {
        if !item.is_empty() && item.bytes().all(|b| b.is_ascii_digit()) {
            PathSegment::Index(item.to_string())
        } else {
            PathSegment::Key(unescape_pointer_token(item))
        }
    }));
    segments
}

pub fn segments_to_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
            PathSegment::Index(i) => {
                out.push('[');
                out.push_str(i);
                out.push(']');
            }
        }
    }
    out
}

/// Serializes segments to a JSON Pointer. A leading `$` root segment is dropped.
pub fn segments_to_pointer(segments: &[PathSegment]) -> String {
    let rest = match segments.first() {
        Some(PathSegment::Key(root)) if root == "$" => &segments[1..],
        _ => segments,
    };
    rest.iter()
        .map(|s| format!("/{}", escape_pointer_token(s.value())))
        .collect()
}

pub fn path_to_pointer(path: &str) -> String {
    segments_to_pointer(&path_to_segments(path))
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Resolves a JSON Pointer against `document`.
pub fn resolve_pointer<'a>(document: &'a Value, pointer: &str) -> Result<&'a Value, ExtractError> {
    document
        .pointer(pointer)
        .ok_or_else(|| ExtractError::Unresolved {
            query: pointer.to_string(),
        })
}

/// Resolves a dotted path against `document`.
pub fn resolve_path<'a>(document: &'a Value, path: &str) -> Result<&'a Value, ExtractError> {
    let pointer = path_to_pointer(path);
    document
        .pointer(&pointer)
        .ok_or_else(|| ExtractError::Unresolved {
            query: path.to_string(),
        })
}

/// Text form of a value, as used for record ids: strings verbatim, `null` as the
/// empty string, anything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
