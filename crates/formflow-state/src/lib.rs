//! Constrained JSON Patch engine for conversational form filling.
//!
//! `formflow-state` implements the `add` / `replace` / `remove` subset of
//! RFC 6902 over RFC 6901 pointers, with the guard rails a form-filling
//! conversation needs when patches come from an untrusted generator:
//!
//! - **Authorization**: every write target must be covered by an
//!   [`AllowedPaths`] set (exact pointers, `-` for any array index, `*` for
//!   any map key).
//! - **Validation**: batches are checked all-or-nothing; the first failing
//!   operation is reported with its index and the rule it broke.
//! - **Repair**: `replace` on an absent path becomes `add`, `remove` on an
//!   absent path is dropped.
//! - **Apply**: the repaired batch is applied to a scratch copy and the
//!   result deserialized back into the form type. Inputs are never mutated.
//! - **Diff**: [`diff`] seeds a form from a prefilled value through the same
//!   patch machinery.
//!
//! # Deterministic State Transitions
//!
//! ```text
//! Form' = apply(Form, repair(Form, Ops))
//! ```
//!
//! # Quick Start
//!
//! ```
//! use formflow_state::{apply, validate, AllowedPaths, Operation};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Clone, Debug, Default, Serialize, Deserialize)]
//! struct Contact {
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! let allowed: AllowedPaths = ["/name", "/email"].into_iter().collect();
//! let ops = vec![
//!     Operation::replace("/name", json!("Ann")),
//!     Operation::replace("/email", json!("ann@example.com")),
//! ];
//!
//! validate(&ops, &allowed).unwrap();
//! let current = Contact::default();
//! let next = apply(&current, &ops).unwrap();
//!
//! assert_eq!(next.name, "Ann");
//! assert_eq!(current.name, ""); // Original unchanged
//! ```

mod apply;
mod authorize;
mod diff;
mod error;
mod op;
mod patch;
mod pointer;
mod schema;
mod validate;

// Core types
pub use error::{value_type_name, PatchError, PatchResult, ValidationRule};
pub use op::{OpKind, Operation};
pub use patch::Patch;
pub use pointer::{escape_segment, has_valid_escapes, unescape_segment, Pointer};

// Engine
pub use apply::{apply, apply_value, path_exists, repair_operations};
pub use authorize::{is_path_allowed, AllowedPaths, ARRAY_WILDCARD, MAP_WILDCARD};
pub use diff::{diff, diff_values, is_zero_value};
pub use schema::Schema;
pub use validate::{validate, validate_paths, validate_with_mode, ValidationMode};

// Re-export serde_json::Value for convenience
pub use serde_json::Value;
