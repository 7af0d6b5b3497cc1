use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use boardroom_schema::ConversationLog;

/// Storage key holding the JSON array of archived conversations.
pub const LOGS_STORAGE_KEY: &str = "boardroom-conversation-logs";

/// String blobs addressed by key.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key under `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Archived conversations, newest first.
pub struct LogStore {
    storage: Arc<dyn KeyValueStorage>,
    logs: Vec<ConversationLog>,
}

impl LogStore {
    /// Loads the stored list. Unreadable or malformed data counts as no logs.
    pub fn open(storage: Arc<dyn KeyValueStorage>) -> Self {
        let logs = match storage.get(LOGS_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ConversationLog>>(&raw) {
                Ok(logs) => logs,
                Err(e) => {
                    tracing::warn!(error = %e, "stored conversation logs are malformed, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read conversation logs, starting empty");
                Vec::new()
            }
        };
        Self { storage, logs }
    }

    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemoryStorage::new()))
    }

    pub fn list(&self) -> &[ConversationLog] {
        &self.logs
    }

    pub fn view(&self, id: &str) -> Option<&ConversationLog> {
        self.logs.iter().find(|log| log.id == id)
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Prepends `log` and writes the whole list back. The log stays in
    /// memory even when the write fails.
    pub fn append(&mut self, log: ConversationLog) -> Result<()> {
        self.logs.insert(0, log);
        let json = serde_json::to_string(&self.logs)?;
        self.storage.set(LOGS_STORAGE_KEY, &json)
    }
}
