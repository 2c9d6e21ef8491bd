//! Collaborator SPI: intent classification, patch generation, dialogue.
//!
//! Implementations may be rule-based or model-backed. None of them may mutate
//! the form; the flow owns every state change. Collaborators are not trusted:
//! patches are validated against the allow-list regardless of what the
//! request advertised.

use crate::{CollaboratorError, FieldInfo, Message, Phase, ValidationError};
use async_trait::async_trait;
use formflow_state::Patch;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;

/// Incrementally generated message text.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<String, CollaboratorError>> + Send>>;

/// What the user wants to do this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Cancel,
    Confirm,
    Back,
    /// Provide or change field values.
    Edit,
    /// Chit-chat or anything without a form effect.
    DoNothing,
}

impl Intent {
    /// Whether the intent short-circuits the patch/dialogue pipeline.
    #[inline]
    pub fn is_command(self) -> bool {
        matches!(self, Intent::Cancel | Intent::Confirm | Intent::Back)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::Cancel => "cancel",
            Intent::Confirm => "confirm",
            Intent::Back => "back",
            Intent::Edit => "edit",
            Intent::DoNothing => "do_nothing",
        };
        f.write_str(name)
    }
}

/// Input for [`IntentClassifier::classify`].
#[derive(Debug, Clone)]
pub struct IntentRequest<T> {
    pub user_input: String,
    pub phase: Phase,
    pub form_state: T,
    pub state_summary: String,
    /// Most recent turns, oldest first.
    pub history: Vec<Message>,
}

/// Input for [`PatchGenerator::generate_patch`].
#[derive(Debug, Clone)]
pub struct PatchRequest<T> {
    pub user_input: String,
    pub form_state: T,
    /// Sorted allow-list patterns; empty means unrestricted.
    pub allowed_paths: Vec<String>,
    pub missing_fields: Vec<FieldInfo>,
    /// Guidance text keyed by JSON Pointer, for missing fields only.
    pub field_guidance: BTreeMap<String, String>,
    pub history: Vec<Message>,
}

/// Input for [`DialogueGenerator::generate_message`].
#[derive(Debug, Clone)]
pub struct DialogueRequest<T> {
    pub phase: Phase,
    pub form_state: T,
    pub state_summary: String,
    pub missing_fields: Vec<FieldInfo>,
    pub validation_errors: Vec<ValidationError>,
    pub last_user_input: String,
    pub patch_applied: bool,
    pub history: Vec<Message>,
}

/// Classifies a user turn.
#[async_trait]
pub trait IntentClassifier<T: Send + Sync>: Send + Sync {
    async fn classify(&self, request: &IntentRequest<T>) -> Result<Intent, CollaboratorError>;
}

/// Turns free text into a best-effort patch batch.
#[async_trait]
pub trait PatchGenerator<T: Send + Sync>: Send + Sync {
    async fn generate_patch(&self, request: &PatchRequest<T>) -> Result<Patch, CollaboratorError>;
}

/// Produces the next user-facing message. Must return non-empty text or fail.
#[async_trait]
pub trait DialogueGenerator<T: Send + Sync>: Send + Sync {
    async fn generate_message(
        &self,
        request: &DialogueRequest<T>,
    ) -> Result<String, CollaboratorError>;

    /// Stream the next message. Defaults to a single chunk holding the
    /// result of [`generate_message`](Self::generate_message).
    async fn generate_message_stream(
        &self,
        request: &DialogueRequest<T>,
    ) -> Result<MessageStream, CollaboratorError> {
        let text = self.generate_message(request).await?;
        Ok(Box::pin(futures::stream::iter([Ok::<_, CollaboratorError>(text)])))
    }
}
