//! Patch operations: the `add` / `replace` / `remove` subset of RFC 6902.
//!
//! Paths are kept as raw pointer text so that malformed input coming from an
//! upstream generator survives deserialization and is rejected by the
//! validator with the index of the offending operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of a patch operation.
///
/// Unknown kinds deserialize into [`OpKind::Unknown`] instead of failing, so
/// that validation can report them precisely.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OpKind {
    /// Insert or overwrite a value.
    Add,
    /// Overwrite an existing value.
    Replace,
    /// Remove an existing value.
    Remove,
    /// Anything else the generator produced.
    Unknown(String),
}

impl OpKind {
    /// Canonical wire name.
    pub fn as_str(&self) -> &str {
        match self {
            OpKind::Add => "add",
            OpKind::Replace => "replace",
            OpKind::Remove => "remove",
            OpKind::Unknown(other) => other,
        }
    }

    /// Whether this kind requires a value.
    #[inline]
    pub fn requires_value(&self) -> bool {
        matches!(self, OpKind::Add | OpKind::Replace)
    }

    /// Whether this is one of the supported kinds.
    #[inline]
    pub fn is_known(&self) -> bool {
        !matches!(self, OpKind::Unknown(_))
    }
}

impl From<String> for OpKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "add" => OpKind::Add,
            "replace" => OpKind::Replace,
            "remove" => OpKind::Remove,
            _ => OpKind::Unknown(s),
        }
    }
}

impl From<&str> for OpKind {
    fn from(s: &str) -> Self {
        OpKind::from(s.to_owned())
    }
}

impl From<OpKind> for String {
    fn from(kind: OpKind) -> Self {
        match kind {
            OpKind::Unknown(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single patch operation.
///
/// Serialized as `{"op": "add", "path": "/name", "value": "Alice"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation kind.
    pub op: OpKind,
    /// Target JSON Pointer (raw text).
    pub path: String,
    /// Value for `add` / `replace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Free-text note from the generator. Ignored when applying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Operation {
    /// Create an `add` operation.
    #[inline]
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: OpKind::Add,
            path: path.into(),
            value: Some(value.into()),
            description: None,
        }
    }

    /// Create a `replace` operation.
    #[inline]
    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: OpKind::Replace,
            path: path.into(),
            value: Some(value.into()),
            description: None,
        }
    }

    /// Create a `remove` operation.
    #[inline]
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: OpKind::Remove,
            path: path.into(),
            value: None,
            description: None,
        }
    }

    /// Attach a description (builder pattern).
    #[inline]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Operation kind name.
    #[inline]
    pub fn name(&self) -> &str {
        self.op.as_str()
    }

    /// Whether a non-null value is present.
    #[inline]
    pub fn has_value(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_null())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.path)
    }
}
