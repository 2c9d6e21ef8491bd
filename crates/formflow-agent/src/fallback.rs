//! Ordered collaborator chains: the first strategy that succeeds wins.

use async_trait::async_trait;
use formflow_contract::{
    CollaboratorError, DialogueGenerator, DialogueRequest, Intent, IntentClassifier,
    IntentRequest, MessageStream, PatchGenerator, PatchRequest,
};
use formflow_state::Patch;
use std::sync::Arc;

fn empty_chain(name: &str) -> CollaboratorError {
    CollaboratorError::msg(name, "no strategies configured")
}

/// Tries each classifier in order.
pub struct FallbackIntentClassifier<T: Send + Sync> {
    strategies: Vec<Arc<dyn IntentClassifier<T>>>,
}

impl<T: Send + Sync> FallbackIntentClassifier<T> {
    pub fn new(strategies: Vec<Arc<dyn IntentClassifier<T>>>) -> Self {
        Self { strategies }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[async_trait]
impl<T: Send + Sync> IntentClassifier<T> for FallbackIntentClassifier<T> {
    async fn classify(&self, request: &IntentRequest<T>) -> Result<Intent, CollaboratorError> {
        let mut last_err = None;
        for (i, strategy) in self.strategies.iter().enumerate() {
            match strategy.classify(request).await {
                Ok(intent) => return Ok(intent),
                Err(e) => {
                    tracing::warn!(strategy = i, error = %e, "intent classifier failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| empty_chain("intent_classifier")))
    }
}

/// Tries each patch generator in order.
pub struct FallbackPatchGenerator<T: Send + Sync> {
    strategies: Vec<Arc<dyn PatchGenerator<T>>>,
}

impl<T: Send + Sync> FallbackPatchGenerator<T> {
    pub fn new(strategies: Vec<Arc<dyn PatchGenerator<T>>>) -> Self {
        Self { strategies }
    }
}

#[async_trait]
impl<T: Send + Sync> PatchGenerator<T> for FallbackPatchGenerator<T> {
    async fn generate_patch(&self, request: &PatchRequest<T>) -> Result<Patch, CollaboratorError> {
        let mut last_err = None;
        for (i, strategy) in self.strategies.iter().enumerate() {
            match strategy.generate_patch(request).await {
                Ok(patch) => return Ok(patch),
                Err(e) => {
                    tracing::warn!(strategy = i, error = %e, "patch generator failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| empty_chain("patch_generator")))
    }
}

/// Tries each dialogue generator in order. Empty text counts as a failure.
///
/// When streaming, the first strategy that opens a stream wins; failures
/// after that point surface as error chunks.
pub struct FallbackDialogueGenerator<T: Send + Sync> {
    strategies: Vec<Arc<dyn DialogueGenerator<T>>>,
}

impl<T: Send + Sync> FallbackDialogueGenerator<T> {
    pub fn new(strategies: Vec<Arc<dyn DialogueGenerator<T>>>) -> Self {
        Self { strategies }
    }
}

#[async_trait]
impl<T: Send + Sync> DialogueGenerator<T> for FallbackDialogueGenerator<T> {
    async fn generate_message(
        &self,
        request: &DialogueRequest<T>,
    ) -> Result<String, CollaboratorError> {
        let mut last_err = None;
        for (i, strategy) in self.strategies.iter().enumerate() {
            let result = strategy.generate_message(request).await.and_then(|text| {
                if text.trim().is_empty() {
                    Err(CollaboratorError::msg("dialogue_generator", "empty message"))
                } else {
                    Ok(text)
                }
            });
            match result {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(strategy = i, error = %e, "dialogue generator failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| empty_chain("dialogue_generator")))
    }

    async fn generate_message_stream(
        &self,
        request: &DialogueRequest<T>,
    ) -> Result<MessageStream, CollaboratorError> {
        let mut last_err = None;
        for (i, strategy) in self.strategies.iter().enumerate() {
            match strategy.generate_message_stream(request).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::warn!(strategy = i, error = %e, "dialogue stream failed to open, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| empty_chain("dialogue_generator")))
    }
}
