//! Form domain types and the [`FormSpec`] plug-in trait.

use crate::CollaboratorError;
use async_trait::async_trait;
use formflow_state::{AllowedPaths, Schema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounds every form value type must satisfy.
pub trait FormValue:
    Serialize + DeserializeOwned + Clone + Default + Send + Sync + fmt::Debug + 'static
{
}

impl<T> FormValue for T where
    T: Serialize + DeserializeOwned + Clone + Default + Send + Sync + fmt::Debug + 'static
{
}

/// Coarse lifecycle stage of a form conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Gathering field values.
    #[default]
    Collecting,
    /// All required fields present and valid; waiting for confirmation.
    Confirming,
    /// Submitted. Terminal.
    Submitted,
    /// Cancelled by the user. Terminal.
    Cancelled,
}

impl Phase {
    /// Whether no further transition can leave this phase.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Submitted | Phase::Cancelled)
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Collecting => "collecting",
            Phase::Confirming => "confirming",
            Phase::Submitted => "submitted",
            Phase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field the form still needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub json_pointer: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub required: bool,
}

impl FieldInfo {
    /// A required field.
    pub fn required(json_pointer: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            json_pointer: json_pointer.into(),
            display_name: display_name.into(),
            description: String::new(),
            required: true,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A present value that fails a domain constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub json_pointer: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(json_pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            json_pointer: json_pointer.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.json_pointer, self.message)
    }
}

/// Domain plug-in describing one form type.
///
/// Everything except [`FormSpec::submit`] is synchronous and must be free of
/// side effects; the flow calls them several times per turn.
#[async_trait]
pub trait FormSpec: Send + Sync {
    /// The form value type.
    type Form: FormValue;

    /// Explicit write allow-list. Empty means "derive from [`FormSpec::schema`]".
    fn allowed_json_pointers(&self) -> Vec<String> {
        Vec::new()
    }

    /// Structural description of [`FormSpec::Form`], used to enumerate
    /// pointers when no explicit allow-list is given.
    fn schema(&self) -> Option<Schema> {
        None
    }

    /// Extra guidance for the patch generator about one field.
    fn field_guide(&self, _json_pointer: &str) -> Option<String> {
        None
    }

    /// Required fields that have no value yet.
    fn missing_facts(&self, form: &Self::Form) -> Vec<FieldInfo>;

    /// Domain constraint violations among present values.
    fn validate_facts(&self, form: &Self::Form) -> Vec<ValidationError>;

    /// Human-readable summary for confirmation prompts.
    fn summary(&self, form: &Self::Form) -> String;

    /// Final side effect. A failure keeps the conversation in `Confirming`.
    async fn submit(&self, form: &Self::Form) -> Result<(), CollaboratorError>;
}

/// Resolve the write allow-list for a spec.
///
/// Explicit pointers win; otherwise the schema is enumerated; with neither
/// the result is unrestricted.
pub fn resolve_allowed_paths<S: FormSpec + ?Sized>(spec: &S) -> AllowedPaths {
    let explicit = spec.allowed_json_pointers();
    if !explicit.is_empty() {
        return explicit.into();
    }
    spec.schema()
        .map(|schema| schema.allowed_paths())
        .unwrap_or_default()
}
