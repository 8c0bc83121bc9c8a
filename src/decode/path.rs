//! Value lookup inside provider items
//!
//! Plain paths use dot notation with optional `[n]` / `[-n]` indexing
//! (`status.errorCode`, `addresses[0].city`). Paths starting with `$` that
//! use wildcards or recursive descent go through JSONPath.

use crate::error::{Error, Result};
use jsonpath_rust::JsonPath;
use serde_json::Value;

/// Look up `path` in `value`
///
/// Returns `Ok(None)` when the path does not resolve. JSONPath queries
/// return the array of matches, or `None` when their root field is absent.
pub fn extract_path(value: &Value, path: &str) -> Result<Option<Value>> {
    if is_jsonpath(path) {
        let root = root_field(path);
        if !root.is_empty() && value.get(root).is_none() {
            return Ok(None);
        }
        return extract_with_jsonpath(value, path).map(Some);
    }
    Ok(extract_simple_path(value, path).cloned())
}

/// Whether a path needs the JSONPath engine
pub fn is_jsonpath(path: &str) -> bool {
    path.starts_with('$') && (path.contains('*') || path.contains("..") || path.contains("[?"))
}

fn root_field(path: &str) -> &str {
    let rest = path.trim_start_matches('$').trim_start_matches('.');
    let end = rest.find(['.', '[']).unwrap_or(rest.len());
    &rest[..end]
}

fn extract_simple_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        let Some(bracket) = part.find('[') else {
            current = current.get(part)?;
            continue;
        };

        let name = &part[..bracket];
        if !name.is_empty() {
            current = current.get(name)?;
        }

        // "a[0][1]" indexes twice
        for index in part[bracket..].split('[').skip(1) {
            let index: i64 = index.strip_suffix(']')?.parse().ok()?;
            let Value::Array(items) = current else {
                return None;
            };
            let position = if index < 0 {
                items.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                index as usize
            };
            current = items.get(position)?;
        }
    }

    Some(current)
}

fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Value> {
    let jp = JsonPath::<Value>::try_from(path).map_err(|e| Error::JsonPath {
        message: format!("Invalid JSONPath '{path}': {e}"),
    })?;

    Ok(match jp.find(value) {
        Value::Null => Value::Array(Vec::new()),
        Value::Array(found) => Value::Array(found),
        other => Value::Array(vec![other]),
    })
}

/// Check that a JSONPath expression parses
pub fn validate_jsonpath(path: &str) -> Result<()> {
    if is_jsonpath(path) {
        JsonPath::<Value>::try_from(path).map_err(|e| Error::JsonPath {
            message: format!("Invalid JSONPath '{path}': {e}"),
        })?;
    }
    Ok(())
}
