//! Content patch engine: ordered structural edits over JSON content.
//!
//! Operations follow the RFC 6902 shape (add / remove / replace / move /
//! copy / test) with JSON Pointer addressing. Application is a pure
//! function: the base value is never mutated, the same operation list over
//! the same base always produces the same output value, and any failing
//! operation aborts the whole application with no partial result. The output
//! feeds content addressing, so determinism here is a correctness
//! requirement, not a nicety.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PatchError;

/// A single structural edit operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert a value at the path (replacing an existing object member).
    Add { path: String, value: Value },
    /// Remove the value at the path. The path must exist.
    Remove { path: String },
    /// Replace the value at the path. The path must exist.
    Replace { path: String, value: Value },
    /// Remove the value at `from` and add it at `path`.
    Move { from: String, path: String },
    /// Copy the value at `from` to `path`.
    Copy { from: String, path: String },
    /// Assert the value at the path equals `value`.
    Test { path: String, value: Value },
}

/// Parse a patch operation list out of a commit's data value.
pub fn parse_patch(data: &Value) -> Result<Vec<PatchOp>, PatchError> {
    serde_json::from_value(data.clone()).map_err(|e| PatchError::MalformedPatch(e.to_string()))
}

/// Apply an ordered operation list to a base content value.
///
/// Returns the new value; the base is untouched.
pub fn apply_patch(base: &Value, ops: &[PatchOp]) -> Result<Value, PatchError> {
    let mut doc = base.clone();
    for op in ops {
        apply_op(&mut doc, op)?;
    }
    Ok(doc)
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), PatchError> {
    match op {
        PatchOp::Add { path, value } => {
            let tokens = parse_pointer(path)?;
            add(doc, &tokens, value.clone(), path)
        }
        PatchOp::Remove { path } => {
            let tokens = parse_pointer(path)?;
            remove(doc, &tokens, path).map(|_| ())
        }
        PatchOp::Replace { path, value } => {
            let tokens = parse_pointer(path)?;
            replace(doc, &tokens, value.clone(), path)
        }
        PatchOp::Move { from, path } => {
            let from_tokens = parse_pointer(from)?;
            let path_tokens = parse_pointer(path)?;
            if from_tokens.len() < path_tokens.len()
                && path_tokens[..from_tokens.len()] == from_tokens[..]
            {
                return Err(PatchError::MoveIntoSelf {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            if from_tokens == path_tokens {
                return Ok(());
            }
            let value = remove(doc, &from_tokens, from)?;
            add(doc, &path_tokens, value, path)
        }
        PatchOp::Copy { from, path } => {
            let from_tokens = parse_pointer(from)?;
            let value = resolve(doc, &from_tokens)
                .ok_or_else(|| PatchError::PathNotFound(from.clone()))?
                .clone();
            let path_tokens = parse_pointer(path)?;
            add(doc, &path_tokens, value, path)
        }
        PatchOp::Test { path, value } => {
            let tokens = parse_pointer(path)?;
            let actual = resolve(doc, &tokens)
                .ok_or_else(|| PatchError::PathNotFound(path.clone()))?;
            if actual != value {
                return Err(PatchError::TestFailed {
                    path: path.clone(),
                    expected: value.clone(),
                    actual: actual.clone(),
                });
            }
            Ok(())
        }
    }
}

/// Split a JSON Pointer into unescaped reference tokens.
fn parse_pointer(pointer: &str) -> Result<Vec<String>, PatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    if !pointer.starts_with('/') {
        return Err(PatchError::InvalidPointer(pointer.to_string()));
    }
    pointer
        .split('/')
        .skip(1)
        .map(|token| unescape_token(token, pointer))
        .collect()
}

fn unescape_token(token: &str, pointer: &str) -> Result<String, PatchError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return Err(PatchError::InvalidPointer(pointer.to_string())),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Parse an array index token. Leading zeros are rejected per RFC 6901.
fn parse_index(token: &str, len: usize, allow_end: bool, path: &str) -> Result<usize, PatchError> {
    let invalid = || PatchError::InvalidIndex {
        path: path.to_string(),
        index: token.to_string(),
    };

    if token.len() > 1 && token.starts_with('0') {
        return Err(invalid());
    }
    let index: usize = token.parse().map_err(|_| invalid())?;
    let max = if allow_end { len } else { len.saturating_sub(1) };
    if len == 0 && !allow_end {
        return Err(invalid());
    }
    if index > max {
        return Err(invalid());
    }
    Ok(index)
}

fn resolve<'a>(doc: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get(token)?,
            Value::Array(arr) => {
                if token.len() > 1 && token.starts_with('0') {
                    return None;
                }
                arr.get(token.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn resolve_mut<'a>(doc: &'a mut Value, tokens: &[String]) -> Option<&'a mut Value> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token)?,
            Value::Array(arr) => {
                if token.len() > 1 && token.starts_with('0') {
                    return None;
                }
                arr.get_mut(token.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn add(doc: &mut Value, tokens: &[String], value: Value, path: &str) -> Result<(), PatchError> {
    let Some((last, parent_tokens)) = tokens.split_last() else {
        *doc = value;
        return Ok(());
    };

    let parent = resolve_mut(doc, parent_tokens)
        .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;

    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(arr) => {
            if last == "-" {
                arr.push(value);
            } else {
                let index = parse_index(last, arr.len(), true, path)?;
                arr.insert(index, value);
            }
            Ok(())
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

fn remove(doc: &mut Value, tokens: &[String], path: &str) -> Result<Value, PatchError> {
    let Some((last, parent_tokens)) = tokens.split_last() else {
        // The root cannot be removed.
        return Err(PatchError::InvalidPointer(path.to_string()));
    };

    let parent = resolve_mut(doc, parent_tokens)
        .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;

    match parent {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(arr) => {
            let index = parse_index(last, arr.len(), false, path)?;
            Ok(arr.remove(index))
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

fn replace(doc: &mut Value, tokens: &[String], value: Value, path: &str) -> Result<(), PatchError> {
    let target =
        resolve_mut(doc, tokens).ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;
    *target = value;
    Ok(())
}
