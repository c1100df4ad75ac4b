use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreResult, UpdateFn};

/// Flat JSON file store. The whole document set is kept in memory and the
/// file is rewritten on every mutation while the write lock is held, so
/// writes are serialized and the file always reflects a committed state.
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty when the file does not exist
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let data = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await?;
            }
            BTreeMap::new()
        };

        info!("Opened JSON store at {} ({} documents)", path.display(), data.len());
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &BTreeMap<String, Value>) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &self.path).await?;
        debug!("Persisted {} documents to {}", data.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        next.insert(key.to_string(), value);
        self.persist(&next).await?;
        *data = next;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        if !data.contains_key(key) {
            return Ok(false);
        }
        let mut next = data.clone();
        next.remove(key);
        self.persist(&next).await?;
        *data = next;
        Ok(true)
    }

    async fn list_by_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>> {
        let data = self.data.read().await;
        Ok(data
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn update(&self, key: &str, apply: UpdateFn) -> StoreResult<Value> {
        let mut data = self.data.write().await;
        let updated = apply(data.get(key).cloned())?;
        let mut next = data.clone();
        next.insert(key.to_string(), updated.clone());
        self.persist(&next).await?;
        *data = next;
        Ok(updated)
    }

    fn backend_name(&self) -> &str {
        "json_file"
    }
}
