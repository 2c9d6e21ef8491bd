//! Persistence contracts for conversation state and history.
//!
//! Every call carries an opaque routing key. Backends must isolate keys from
//! each other; serializing concurrent turns for the same key is the caller's
//! job.

use crate::message::append_history;
use crate::{Message, Phase};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persisted state of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState<T> {
    #[serde(default)]
    pub phase: Phase,
    pub form_state: T,
}

impl<T> ConversationState<T> {
    pub fn new(phase: Phase, form_state: T) -> Self {
        Self { phase, form_state }
    }
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key not found where one was required.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid routing key (path traversal, control chars, etc.).
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Read/write access to conversation state.
#[async_trait]
pub trait StateStore<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Load the state for `key`, if any.
    async fn read(&self, key: &str) -> Result<Option<ConversationState<T>>, StoreError>;

    /// Persist the state for `key`.
    async fn write(&self, key: &str, state: &ConversationState<T>) -> Result<(), StoreError>;

    /// Delete the state for `key`. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Load the state for `key`, defaulting to `Collecting` with an empty form.
    async fn read_or_default(&self, key: &str) -> Result<ConversationState<T>, StoreError>
    where
        T: Default,
    {
        Ok(self.read(key).await?.unwrap_or_default())
    }
}

/// Conversation history persistence.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the history for `key` (empty when absent).
    async fn load(&self, key: &str) -> Result<Vec<Message>, StoreError>;

    /// Replace the history for `key`.
    async fn save(&self, key: &str, history: Vec<Message>) -> Result<(), StoreError>;

    /// Delete the history for `key`.
    async fn clear(&self, key: &str) -> Result<(), StoreError>;

    /// Append messages, skipping consecutive duplicates, and return the
    /// history as persisted (after any trimming the store applies on save).
    async fn append(&self, key: &str, messages: Vec<Message>) -> Result<Vec<Message>, StoreError> {
        let mut history = self.load(key).await?;
        append_history(&mut history, messages);
        self.save(key, history).await?;
        self.load(key).await
    }
}
