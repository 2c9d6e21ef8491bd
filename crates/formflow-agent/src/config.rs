//! Form-flow configuration.

use formflow_state::ValidationMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config (JSON): {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for [`FormFlow`](crate::FormFlow).
///
/// Every field has a default, so a config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormFlowConfig {
    /// How generated patches are checked before apply.
    pub validation_mode: ValidationMode,
    pub cancelled_message: String,
    pub submitted_message: String,
    /// Confirm requested while fields are still missing or outside `Confirming`.
    pub confirm_blocked_message: String,
    /// Confirm requested but re-validation found errors.
    pub validation_failed_message: String,
    pub back_message: String,
    /// Back requested outside `Confirming`.
    pub back_ignored_message: String,
    /// Prefix of the message shown when a turn failed and was recovered.
    pub fallback_message: String,
    /// Rule-based dialogue lists every open field instead of the first one.
    pub merge_all_fields: bool,
    /// Number of most recent history messages handed to collaborators.
    pub history_window: usize,
    /// Drop stored state and history once a conversation ends.
    pub clear_on_completion: bool,
}

impl Default for FormFlowConfig {
    fn default() -> Self {
        Self {
            validation_mode: ValidationMode::Strict,
            cancelled_message: "The form has been cancelled.".to_string(),
            submitted_message: "The form has been submitted successfully!".to_string(),
            confirm_blocked_message:
                "Please complete all required fields before confirming.".to_string(),
            validation_failed_message:
                "The form has validation errors. Please fix them before submitting.".to_string(),
            back_message: "Back to editing. You can keep changing the form.".to_string(),
            back_ignored_message: "We are not confirming yet, so there is nothing to go back from."
                .to_string(),
            fallback_message: "Sorry, something went wrong while processing your input."
                .to_string(),
            merge_all_fields: false,
            history_window: 10,
            clear_on_completion: true,
        }
    }
}

impl FormFlowConfig {
    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    #[must_use]
    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    #[must_use]
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    #[must_use]
    pub fn with_clear_on_completion(mut self, clear: bool) -> Self {
        self.clear_on_completion = clear;
        self
    }

    #[must_use]
    pub fn with_merge_all_fields(mut self, merge: bool) -> Self {
        self.merge_all_fields = merge;
        self
    }
}
