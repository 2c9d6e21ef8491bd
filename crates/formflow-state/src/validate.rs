//! Structural validation of operation batches.
//!
//! Validation is all-or-nothing: the first failing operation aborts with its
//! index and the rule it broke.

use crate::pointer::has_valid_escapes;
use crate::{is_path_allowed, AllowedPaths, Operation, PatchError, PatchResult, ValidationRule};
use serde::{Deserialize, Serialize};

/// How strictly generator output is checked before apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Kind, pointer syntax, escapes, value presence and authorization.
    #[default]
    Strict,
    /// Kind and authorization only; shape problems surface at apply time.
    PathsOnly,
}

/// Validate a batch with the given mode.
pub fn validate_with_mode(
    ops: &[Operation],
    allowed: &AllowedPaths,
    mode: ValidationMode,
) -> PatchResult<()> {
    match mode {
        ValidationMode::Strict => validate(ops, allowed),
        ValidationMode::PathsOnly => validate_paths(ops, allowed),
    }
}

/// Strict validation.
///
/// ```
/// use formflow_state::{validate, AllowedPaths, Operation};
/// use serde_json::json;
///
/// let allowed: AllowedPaths = ["/name"].into_iter().collect();
/// assert!(validate(&[Operation::add("/name", json!("Ann"))], &allowed).is_ok());
/// assert!(validate(&[Operation::add("/role", json!("admin"))], &allowed).is_err());
/// ```
pub fn validate(ops: &[Operation], allowed: &AllowedPaths) -> PatchResult<()> {
    for (index, op) in ops.iter().enumerate() {
        check_operation(op, allowed).map_err(|rule| PatchError::invalid_operation(index, rule))?;
    }
    Ok(())
}

/// Lenient validation: kind and authorization only.
pub fn validate_paths(ops: &[Operation], allowed: &AllowedPaths) -> PatchResult<()> {
    for (index, op) in ops.iter().enumerate() {
        check_kind(op)
            .and_then(|()| check_allowed(op, allowed))
            .map_err(|rule| PatchError::invalid_operation(index, rule))?;
    }
    Ok(())
}

fn check_operation(op: &Operation, allowed: &AllowedPaths) -> Result<(), ValidationRule> {
    check_kind(op)?;
    check_pointer(&op.path)?;
    if op.op.requires_value() && !op.has_value() {
        return Err(ValidationRule::MissingValue {
            op: if op.name() == "add" { "add" } else { "replace" },
            path: op.path.clone(),
        });
    }
    check_allowed(op, allowed)
}

fn check_kind(op: &Operation) -> Result<(), ValidationRule> {
    if op.op.is_known() {
        Ok(())
    } else {
        Err(ValidationRule::UnknownOp(op.op.to_string()))
    }
}

fn check_pointer(path: &str) -> Result<(), ValidationRule> {
    if path.is_empty() {
        return Err(ValidationRule::EmptyPath);
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(ValidationRule::MissingLeadingSlash(path.to_owned()));
    };
    if let Some(bad) = rest.split('/').find(|seg| !has_valid_escapes(seg)) {
        return Err(ValidationRule::BadEscape {
            path: path.to_owned(),
            segment: bad.to_owned(),
        });
    }
    Ok(())
}

fn check_allowed(op: &Operation, allowed: &AllowedPaths) -> Result<(), ValidationRule> {
    if is_path_allowed(&op.path, allowed) {
        Ok(())
    } else {
        Err(ValidationRule::PathNotAllowed(op.path.clone()))
    }
}
