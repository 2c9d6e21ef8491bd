//! Prefill diff: operations that move `current` toward the non-zero parts of
//! `desired`.

use crate::error::value_type_name;
use crate::{Operation, PatchError, PatchResult, Pointer};
use serde::Serialize;
use serde_json::{Map, Value};

/// Whether a value counts as "not set" for prefill purposes.
///
/// `null`, `""`, `0`, `false`, `[]` and `{}` are zero values.
pub fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Compute the operations that fill `current` with the non-zero fields of
/// `desired`.
///
/// Both values must serialize to JSON objects. The result is sorted by path.
///
/// ```
/// use formflow_state::{apply_value, diff_values};
/// use serde_json::json;
///
/// let current = json!({"name": "", "age": 3});
/// let desired = json!({"name": "Ann", "age": 0, "tags": ["a"]});
/// let ops = diff_values(&current, &desired).unwrap();
/// let out = apply_value(&current, &ops).unwrap();
/// assert_eq!(out, json!({"name": "Ann", "age": 3, "tags": ["a"]}));
/// ```
pub fn diff<T: Serialize>(current: &T, desired: &T) -> PatchResult<Vec<Operation>> {
    let current = serde_json::to_value(current)?;
    let desired = serde_json::to_value(desired)?;
    diff_values(&current, &desired)
}

/// Untyped form of [`diff`].
pub fn diff_values(current: &Value, desired: &Value) -> PatchResult<Vec<Operation>> {
    let current = as_object(current)?;
    let desired = as_object(desired)?;

    let mut ops = Vec::new();
    diff_objects(current, desired, &Pointer::root(), &mut ops);
    ops.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(ops)
}

fn as_object(value: &Value) -> PatchResult<&Map<String, Value>> {
    value.as_object().ok_or(PatchError::RootNotObject {
        found: value_type_name(value),
    })
}

fn diff_objects(
    current: &Map<String, Value>,
    desired: &Map<String, Value>,
    prefix: &Pointer,
    ops: &mut Vec<Operation>,
) {
    for (key, want) in desired {
        if is_zero_value(want) {
            continue;
        }
        let path = prefix.child(key.as_str());
        let have = current.get(key);

        match (want, have) {
            (Value::Object(want_obj), Some(Value::Object(have_obj))) => {
                diff_objects(have_obj, want_obj, &path, ops);
            }
            (Value::Object(_), _) => {
                ops.push(Operation::replace(path.to_string(), want.clone()));
            }
            (Value::Array(_), have) => {
                if have != Some(want) {
                    ops.push(Operation::replace(path.to_string(), want.clone()));
                }
            }
            (_, None) => ops.push(Operation::add(path.to_string(), want.clone())),
            (_, Some(have)) if have != want => {
                ops.push(Operation::replace(path.to_string(), want.clone()));
            }
            _ => {}
        }
    }
}
