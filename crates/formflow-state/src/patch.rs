//! Patch container for grouping operations.
//!
//! A `Patch` is the batch a generator hands back for one turn. It serializes
//! as `{"ops": [...]}`, the payload shape patch generators emit.

use crate::Operation;
use serde::{Deserialize, Serialize};

/// An ordered batch of operations, applied atomically.
///
/// # Examples
///
/// ```
/// use formflow_state::{Operation, Patch};
/// use serde_json::json;
///
/// let patch = Patch::new()
///     .with_op(Operation::add("/name", json!("Alice")))
///     .with_op(Operation::replace("/age", json!(30)));
///
/// assert_eq!(patch.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default)]
    ops: Vec<Operation>,
}

impl Patch {
    /// Create an empty patch.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a patch with the given operations.
    #[inline]
    pub fn with_ops(ops: Vec<Operation>) -> Self {
        Self { ops }
    }

    /// Add an operation (builder pattern).
    #[inline]
    pub fn with_op(mut self, op: Operation) -> Self {
        self.ops.push(op);
        self
    }

    /// Push an operation.
    #[inline]
    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// The operations in order.
    #[inline]
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Consume the patch and return its operations.
    #[inline]
    pub fn into_ops(self) -> Vec<Operation> {
        self.ops
    }

    /// Whether the patch has no operations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Iterate over the operations.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter()
    }
}

impl From<Vec<Operation>> for Patch {
    fn from(ops: Vec<Operation>) -> Self {
        Self { ops }
    }
}

impl FromIterator<Operation> for Patch {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Patch {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl Extend<Operation> for Patch {
    fn extend<I: IntoIterator<Item = Operation>>(&mut self, iter: I) {
        self.ops.extend(iter);
    }
}
