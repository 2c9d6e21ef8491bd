use crate::{CollaboratorError, MessageStream, Phase};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key carrying a recoverable failure description.
pub const META_ERROR: &str = "error";
/// Metadata key set to `"true"`/`"false"` depending on whether a patch landed.
pub const META_PATCH_APPLIED: &str = "patch_applied";
/// Metadata key carrying the number of applied operations.
pub const META_OPS: &str = "ops";

/// Result of one conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse<T> {
    pub message: String,
    pub phase: Phase,
    pub form_state: T,
    /// Set when `phase` is terminal.
    pub completed: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl<T> TurnResponse<T> {
    pub fn new(message: impl Into<String>, phase: Phase, form_state: T) -> Self {
        Self {
            message: message.into(),
            phase,
            form_state,
            completed: phase.is_terminal(),
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The recoverable error recorded for this turn, if any.
    pub fn error(&self) -> Option<&str> {
        self.metadata.get(META_ERROR).map(String::as_str)
    }
}

/// Result of one streamed turn. Phase and form are final once this is
/// returned; only the message is still being produced.
pub struct TurnStream<T> {
    pub phase: Phase,
    pub form_state: T,
    pub completed: bool,
    pub metadata: BTreeMap<String, String>,
    pub messages: MessageStream,
}

impl<T> TurnStream<T> {
    /// A turn whose message is already known, streamed as one chunk.
    pub fn from_response(response: TurnResponse<T>) -> Self {
        Self {
            phase: response.phase,
            form_state: response.form_state,
            completed: response.completed,
            metadata: response.metadata,
            messages: Box::pin(futures::stream::iter([Ok::<_, CollaboratorError>(
                response.message,
            )])),
        }
    }

    /// Drain the message stream into a [`TurnResponse`].
    pub async fn collect(self) -> Result<TurnResponse<T>, CollaboratorError> {
        let mut message = String::new();
        let mut messages = self.messages;
        while let Some(chunk) = messages.next().await {
            message.push_str(&chunk?);
        }
        Ok(TurnResponse {
            message,
            phase: self.phase,
            form_state: self.form_state,
            completed: self.completed,
            metadata: self.metadata,
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for TurnStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnStream")
            .field("phase", &self.phase)
            .field("form_state", &self.form_state)
            .field("completed", &self.completed)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
