use crate::KeepLastTrimmer;
use async_trait::async_trait;
use formflow_contract::{ConversationState, HistoryStore, Message, StateStore, StoreError};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory conversation state for testing and local development.
pub struct MemoryStateStore<T> {
    entries: RwLock<HashMap<String, ConversationState<T>>>,
}

impl<T> Default for MemoryStateStore<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> MemoryStateStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl<T> StateStore<T> for MemoryStateStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn read(&self, key: &str) -> Result<Option<ConversationState<T>>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, state: &ConversationState<T>) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), state.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// In-memory conversation history.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: RwLock<HashMap<String, Vec<Message>>>,
    trimmer: Option<KeepLastTrimmer>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the stored history on every save.
    #[must_use]
    pub fn with_trimmer(mut self, trimmer: KeepLastTrimmer) -> Self {
        self.trimmer = Some(trimmer);
        self
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self, key: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, key: &str, history: Vec<Message>) -> Result<(), StoreError> {
        let history = match &self.trimmer {
            Some(trimmer) => trimmer.trim(history),
            None => history,
        };
        self.entries.write().await.insert(key.to_string(), history);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
