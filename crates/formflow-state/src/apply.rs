//! Patch application logic.
//!
//! Batches coming from a patch generator are repaired before they are
//! applied: a `replace` whose target is absent becomes an `add`, and a
//! `remove` whose target is absent is dropped. The repaired batch is then
//! applied atomically to a scratch copy of the document.

use crate::error::value_type_name;
use crate::{OpKind, Operation, PatchError, PatchResult, Pointer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Whether `path` resolves to an existing value in `doc`.
///
/// Unparseable pointers, missing object keys, non-numeric or out-of-range
/// array indices and scalar intermediates all count as "does not exist".
///
/// ```
/// use formflow_state::path_exists;
/// use serde_json::json;
///
/// let doc = json!({"items": [{"amount": 0}]});
/// assert!(path_exists(&doc, "/items/0/amount"));
/// assert!(!path_exists(&doc, "/items/1/amount"));
/// assert!(!path_exists(&doc, "/items/-"));
/// ```
pub fn path_exists(doc: &Value, path: &str) -> bool {
    Pointer::parse(path)
        .ok()
        .and_then(|p| resolve(doc, p.tokens()))
        .is_some()
}

/// Rewrite a batch so that it applies to `doc` without tripping over absent
/// targets.
///
/// This is a pure transformation: every rewrite is logged at `debug` level,
/// and kinds other than `replace`/`remove` pass through untouched.
pub fn repair_operations(doc: &Value, ops: Vec<Operation>) -> Vec<Operation> {
    ops.into_iter()
        .filter_map(|mut op| match op.op {
            OpKind::Replace if !path_exists(doc, &op.path) => {
                tracing::debug!(path = %op.path, "replace target absent, rewriting to add");
                op.op = OpKind::Add;
                Some(op)
            }
            OpKind::Remove if !path_exists(doc, &op.path) => {
                tracing::debug!(path = %op.path, "remove target absent, dropping operation");
                None
            }
            _ => Some(op),
        })
        .collect()
}

/// Repair then apply a batch to an untyped document (pure function).
///
/// `doc` is never modified. Operation indices in errors refer to the
/// repaired batch.
///
/// ```
/// use formflow_state::{apply_value, Operation};
/// use serde_json::json;
///
/// let doc = json!({"name": "Ann"});
/// let ops = vec![
///     Operation::replace("/email", json!("ann@example.com")),
///     Operation::remove("/nickname"),
/// ];
/// let out = apply_value(&doc, &ops).unwrap();
/// assert_eq!(out, json!({"name": "Ann", "email": "ann@example.com"}));
/// assert_eq!(doc, json!({"name": "Ann"}));
/// ```
pub fn apply_value(doc: &Value, ops: &[Operation]) -> PatchResult<Value> {
    let repaired = repair_operations(doc, ops.to_vec());
    let mut scratch = doc.clone();
    apply_repaired(&mut scratch, &repaired)?;
    Ok(scratch)
}

/// Repair then apply a batch to a typed form value.
///
/// Returns a fresh value; `current` is never touched. An empty batch (before
/// or after repair) returns `current` unchanged. A result that no longer
/// deserializes into `T` is a [`PatchError::TypeMismatch`].
pub fn apply<T>(current: &T, ops: &[Operation]) -> PatchResult<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    if ops.is_empty() {
        return Ok(current.clone());
    }

    let mut doc = serde_json::to_value(current)?;
    let repaired = repair_operations(&doc, ops.to_vec());
    if repaired.is_empty() {
        return Ok(current.clone());
    }

    tracing::debug!(ops = repaired.len(), "applying patch");
    apply_repaired(&mut doc, &repaired)?;
    serde_json::from_value(doc).map_err(PatchError::TypeMismatch)
}

fn apply_repaired(doc: &mut Value, ops: &[Operation]) -> PatchResult<()> {
    for (index, op) in ops.iter().enumerate() {
        apply_op(doc, index, op)?;
    }
    Ok(())
}

/// Apply a single operation to a document (mutating).
fn apply_op(doc: &mut Value, index: usize, op: &Operation) -> PatchResult<()> {
    let fail = |reason: String| PatchError::not_applicable(index, op.name(), &op.path, reason);

    let pointer = Pointer::parse(&op.path).map_err(|e| fail(e.to_string()))?;
    let tokens = pointer.tokens();

    match &op.op {
        OpKind::Add => {
            let value = required_value(op).ok_or_else(|| fail("missing value".into()))?;
            apply_add(doc, tokens, value).map_err(fail)
        }
        OpKind::Replace => {
            let value = required_value(op).ok_or_else(|| fail("missing value".into()))?;
            apply_replace(doc, tokens, value).map_err(fail)
        }
        OpKind::Remove => apply_remove(doc, tokens).map_err(fail),
        OpKind::Unknown(kind) => Err(fail(format!("unsupported operation {kind:?}"))),
    }
}

fn required_value(op: &Operation) -> Option<Value> {
    op.value.clone()
}

fn apply_add(doc: &mut Value, tokens: &[String], value: Value) -> Result<(), String> {
    let Some((last, parent_tokens)) = tokens.split_last() else {
        *doc = value;
        return Ok(());
    };

    let parent = resolve_mut(doc, parent_tokens).ok_or("parent does not exist")?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(arr) => {
            if last == "-" {
                arr.push(value);
                return Ok(());
            }
            let idx = parse_index(last).ok_or_else(|| format!("invalid array index {last:?}"))?;
            if idx > arr.len() {
                return Err(format!(
                    "index {idx} out of bounds for insert (len {})",
                    arr.len()
                ));
            }
            arr.insert(idx, value);
            Ok(())
        }
        other => Err(format!(
            "cannot add a member to a {}",
            value_type_name(other)
        )),
    }
}

fn apply_replace(doc: &mut Value, tokens: &[String], value: Value) -> Result<(), String> {
    let slot = resolve_mut(doc, tokens).ok_or("target does not exist")?;
    *slot = value;
    Ok(())
}

fn apply_remove(doc: &mut Value, tokens: &[String]) -> Result<(), String> {
    let Some((last, parent_tokens)) = tokens.split_last() else {
        return Err("cannot remove the document root".into());
    };

    let parent = resolve_mut(doc, parent_tokens).ok_or("target does not exist")?;
    let removed = match parent {
        Value::Object(map) => map.remove(last),
        Value::Array(arr) => match parse_index(last) {
            Some(idx) if idx < arr.len() => Some(arr.remove(idx)),
            _ => None,
        },
        _ => None,
    };
    removed.map(|_| ()).ok_or_else(|| "target does not exist".into())
}

/// Parse an RFC 6901 array index: decimal digits, no leading zeros.
fn parse_index(token: &str) -> Option<usize> {
    let digits_only = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
    if !digits_only || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    token.parse().ok()
}

fn resolve<'a>(doc: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(doc, |current, token| match current {
        Value::Object(map) => map.get(token),
        Value::Array(arr) => arr.get(parse_index(token)?),
        _ => None,
    })
}

fn resolve_mut<'a>(doc: &'a mut Value, tokens: &[String]) -> Option<&'a mut Value> {
    tokens.iter().try_fold(doc, |current, token| match current {
        Value::Object(map) => map.get_mut(token),
        Value::Array(arr) => arr.get_mut(parse_index(token)?),
        _ => None,
    })
}
