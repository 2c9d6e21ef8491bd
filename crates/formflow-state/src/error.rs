//! Error types for patch validation and application.

use std::fmt;
use thiserror::Error;

/// Result type alias for formflow-state operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// The structural rule an operation violated during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationRule {
    /// `op` is not one of `add`, `replace`, `remove`.
    UnknownOp(String),
    /// `path` is empty.
    EmptyPath,
    /// `path` does not begin with `/`.
    MissingLeadingSlash(String),
    /// A `~` inside a segment is not followed by `0` or `1`.
    BadEscape {
        /// The full pointer.
        path: String,
        /// The offending raw segment.
        segment: String,
    },
    /// `add`/`replace` without a non-null value.
    MissingValue {
        /// Operation kind.
        op: &'static str,
        /// Target pointer.
        path: String,
    },
    /// The path is not covered by the allow-list.
    PathNotAllowed(String),
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::UnknownOp(op) => write!(f, "unsupported operation {op:?}"),
            ValidationRule::EmptyPath => write!(f, "path must not be empty"),
            ValidationRule::MissingLeadingSlash(path) => {
                write!(f, "path {path:?} must start with '/'")
            }
            ValidationRule::BadEscape { path, segment } => write!(
                f,
                "path {path:?} has invalid escape in segment {segment:?} ('~' must be followed by '0' or '1')"
            ),
            ValidationRule::MissingValue { op, path } => {
                write!(f, "{op} at {path:?} requires a non-null value")
            }
            ValidationRule::PathNotAllowed(path) => {
                write!(f, "path {path:?} is not in the allowed paths set")
            }
        }
    }
}

/// Errors that can occur while validating, applying or diffing patches.
#[derive(Debug, Error)]
pub enum PatchError {
    /// An operation failed validation. Validation is all-or-nothing.
    #[error("operation {index}: {rule}")]
    InvalidOperation {
        /// Position of the failing operation in the batch.
        index: usize,
        /// The rule that was violated.
        rule: ValidationRule,
    },

    /// A JSON Pointer could not be parsed.
    #[error("invalid JSON pointer {pointer:?}: {reason}")]
    InvalidPointer {
        /// The raw pointer text.
        pointer: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An operation is syntactically fine but cannot be applied to the document.
    #[error("operation {index} ({op} {path}) cannot be applied: {reason}")]
    NotApplicable {
        /// Position of the failing operation in the repaired batch.
        index: usize,
        /// Operation kind.
        op: String,
        /// Target pointer.
        path: String,
        /// Description of what went wrong.
        reason: String,
    },

    /// The document root is not an object where one was required.
    #[error("expected an object at the document root, found {found}")]
    RootNotObject {
        /// Type name of what was found.
        found: &'static str,
    },

    /// The patched document no longer deserializes into the form type.
    #[error("type mismatch: patch would result in an invalid form value: {0}")]
    TypeMismatch(#[source] serde_json::Error),

    /// The current value could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PatchError {
    /// Create a validation error for the operation at `index`.
    #[inline]
    pub fn invalid_operation(index: usize, rule: ValidationRule) -> Self {
        PatchError::InvalidOperation { index, rule }
    }

    /// Create an invalid pointer error.
    #[inline]
    pub fn invalid_pointer(pointer: impl Into<String>, reason: &'static str) -> Self {
        PatchError::InvalidPointer {
            pointer: pointer.into(),
            reason,
        }
    }

    /// Create a not-applicable error.
    #[inline]
    pub fn not_applicable(
        index: usize,
        op: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        PatchError::NotApplicable {
            index,
            op: op.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Index of the offending operation, when the error is tied to one.
    pub fn op_index(&self) -> Option<usize> {
        match self {
            PatchError::InvalidOperation { index, .. } | PatchError::NotApplicable { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

/// Get the type name of a JSON value.
#[inline]
pub fn value_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
