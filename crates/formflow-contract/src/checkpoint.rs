//! Serializable snapshots of a conversation.

use crate::{FieldInfo, Phase, ValidationError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: &str = "1.0";

/// Checkpoint encode/decode errors.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("incompatible checkpoint version: {found} (expected {expected})")]
    IncompatibleVersion {
        found: String,
        expected: &'static str,
    },
}

/// Snapshot of a conversation that can be resumed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<T> {
    pub version: String,
    pub phase: Phase,
    pub form_state: T,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<FieldInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_user_text: Option<String>,
}

impl<T> Checkpoint<T> {
    /// Snapshot with the current version and timestamp.
    pub fn new(phase: Phase, form_state: T, allowed_paths: Vec<String>) -> Self {
        Self {
            version: CHECKPOINT_VERSION.to_string(),
            phase,
            form_state,
            timestamp: current_unix_millis(),
            allowed_paths,
            missing: Vec::new(),
            issues: Vec::new(),
            summary: None,
            last_user_text: None,
        }
    }

    /// Fail unless the version is one this build understands.
    pub fn ensure_compatible(&self) -> Result<(), CheckpointError> {
        if self.version == CHECKPOINT_VERSION {
            Ok(())
        } else {
            tracing::debug!(
                found = %self.version,
                expected = CHECKPOINT_VERSION,
                "rejecting checkpoint with unknown version"
            );
            Err(CheckpointError::IncompatibleVersion {
                found: self.version.clone(),
                expected: CHECKPOINT_VERSION,
            })
        }
    }
}

impl<T: Serialize> Checkpoint<T> {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CheckpointError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<T: DeserializeOwned> Checkpoint<T> {
    /// Decode and check the version.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_slice(bytes)?;
        checkpoint.ensure_compatible()?;
        Ok(checkpoint)
    }
}

pub(crate) fn current_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis().min(u128::from(u64::MAX)) as u64)
}
