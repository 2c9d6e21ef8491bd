use crate::KeepLastTrimmer;
use async_trait::async_trait;
use formflow_contract::{ConversationState, HistoryStore, Message, StateStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const STATE_SUFFIX: &str = "state";
const HISTORY_SUFFIX: &str = "history";
/// Leaves room for the longest suffix within a 255-byte file name.
const MAX_KEY_LEN: usize = 200;

/// JSON-file backed state and history store.
///
/// Each routing key maps to `<key>.state.json` and `<key>.history.json`
/// under the base directory. Writes go to a temp file first and are renamed
/// into place.
pub struct FileStore {
    base_path: PathBuf,
    trimmer: Option<KeepLastTrimmer>,
}

impl FileStore {
    /// Create a new file storage with the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            trimmer: None,
        }
    }

    /// Bound the stored history on every save.
    #[must_use]
    pub fn with_trimmer(mut self, trimmer: KeepLastTrimmer) -> Self {
        self.trimmer = Some(trimmer);
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn entry_path(&self, key: &str, suffix: &str) -> Result<PathBuf, StoreError> {
        Self::validate_key(key)?;
        Ok(self.base_path.join(format!("{key}.{suffix}.json")))
    }

    /// A key becomes the stem of `<key>.<suffix>.json`, so it must stay a
    /// single visible file name: no separators or control characters, no
    /// leading `.` (temp files live there), and short enough for the suffix.
    fn validate_key(key: &str) -> Result<(), StoreError> {
        let problem = if key.is_empty() {
            "is empty"
        } else if key.starts_with('.') {
            "starts with '.'"
        } else if key.chars().any(|c| matches!(c, '/' | '\\') || c.is_control()) {
            "contains a path separator or control character"
        } else if key.len() > MAX_KEY_LEN {
            "is too long"
        } else {
            return Ok(());
        };
        Err(StoreError::InvalidKey(format!("routing key {key:?} {problem}")))
    }

    async fn read_json<V: DeserializeOwned>(&self, path: &Path) -> Result<Option<V>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write JSON to `path` atomically.
    async fn write_json<V: Serialize + ?Sized>(
        &self,
        key: &str,
        path: &Path,
        value: &V,
    ) -> Result<(), StoreError> {
        if !self.base_path.exists() {
            tokio::fs::create_dir_all(&self.base_path).await?;
        }
        let content = serde_json::to_string_pretty(value)?;

        let tmp_path = self
            .base_path
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            match tokio::fs::rename(&tmp_path, path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tokio::fs::remove_file(path).await?;
                    tokio::fs::rename(&tmp_path, path).await?;
                }
                Err(e) => return Err(e),
            }
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), StoreError> {
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> StateStore<T> for FileStore
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn read(&self, key: &str) -> Result<Option<ConversationState<T>>, StoreError> {
        let path = self.entry_path(key, STATE_SUFFIX)?;
        self.read_json(&path).await
    }

    async fn write(&self, key: &str, state: &ConversationState<T>) -> Result<(), StoreError> {
        let path = self.entry_path(key, STATE_SUFFIX)?;
        self.write_json(key, &path, state).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key, STATE_SUFFIX)?;
        self.remove_file(&path).await
    }
}

#[async_trait]
impl HistoryStore for FileStore {
    async fn load(&self, key: &str) -> Result<Vec<Message>, StoreError> {
        let path = self.entry_path(key, HISTORY_SUFFIX)?;
        Ok(self.read_json(&path).await?.unwrap_or_default())
    }

    async fn save(&self, key: &str, history: Vec<Message>) -> Result<(), StoreError> {
        let path = self.entry_path(key, HISTORY_SUFFIX)?;
        let history = match &self.trimmer {
            Some(trimmer) => trimmer.trim(history),
            None => history,
        };
        self.write_json(key, &path, &history).await
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key, HISTORY_SUFFIX)?;
        self.remove_file(&path).await
    }
}
