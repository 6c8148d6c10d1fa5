use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};
use tracing::{debug, error};

use super::{carry_over, Item, KvStore, StoreError};

/// JSON file-backed items table.
///
/// Persists a `HashMap<key, Item>` to `<data_dir>/<table>.json`. Each
/// conditional write checks, mutates and persists under one write lock; if
/// persisting fails the in-memory change is undone.
pub struct JsonFileStore {
    table: String,
    inner: RwLock<HashMap<String, Item>>,
    file_path: PathBuf,
}

fn io_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl JsonFileStore {
    /// Open the table file under `data_dir`, creating an empty one if missing.
    pub async fn open<P: Into<PathBuf>>(data_dir: P, table: &str) -> Result<Arc<Self>, StoreError> {
        let file_path = data_dir.into().join(format!("{table}.json"));
        Self::new(table, file_path).await
    }

    /// Initialize the store from an explicit file path.
    pub async fn new<P: Into<PathBuf>>(table: &str, path: P) -> Result<Arc<Self>, StoreError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let map: HashMap<String, Item> = match fs::read(&file_path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                error!(path = %file_path.display(), error = %e, "items file is not valid JSON");
                io_err(format!("corrupt store file {}: {e}", file_path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty: HashMap<String, Item> = HashMap::new();
                fs::write(&file_path, serde_json::to_vec(&empty).map_err(io_err)?)
                    .await
                    .map_err(io_err)?;
                empty
            }
            Err(e) => return Err(io_err(e)),
        };
        debug!(table, items = map.len(), path = %file_path.display(), "json file store opened");

        Ok(Arc::new(Self { table: table.to_string(), inner: RwLock::new(map), file_path }))
    }

    /// Write the whole map via a temp file + rename so readers never see a torn file.
    async fn save(&self, map: &HashMap<String, Item>) -> Result<(), StoreError> {
        let data = serde_json::to_vec(map).map_err(io_err)?;
        let tmp = self.file_path.with_extension("json.tmp");
        fs::write(&tmp, data).await.map_err(io_err)?;
        fs::rename(&tmp, &self.file_path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    fn table_name(&self) -> &str { &self.table }

    async fn get(&self, key: &str) -> Result<Option<Item>, StoreError> {
        let map = self.inner.read().await;
        Ok(map.get(key).cloned())
    }

    async fn scan(&self) -> Result<Vec<Item>, StoreError> {
        let map = self.inner.read().await;
        Ok(map.values().cloned().collect())
    }

    async fn put_if_absent(&self, key: &str, item: Item) -> Result<(), StoreError> {
        let mut map = self.inner.write().await;
        if map.contains_key(key) {
            return Err(StoreError::ConditionFailed);
        }
        map.insert(key.to_string(), item);
        if let Err(e) = self.save(&map).await {
            map.remove(key);
            return Err(e);
        }
        Ok(())
    }

    async fn put_if_present(&self, key: &str, mut item: Item, retain: &[&str]) -> Result<Item, StoreError> {
        let mut map = self.inner.write().await;
        let Some(stored) = map.get(key) else {
            return Err(StoreError::ConditionFailed);
        };
        carry_over(&mut item, stored, retain);
        let prior = map.insert(key.to_string(), item.clone());
        if let Err(e) = self.save(&map).await {
            if let Some(prior) = prior {
                map.insert(key.to_string(), prior);
            }
            return Err(e);
        }
        Ok(item)
    }

    async fn delete_if_present(&self, key: &str) -> Result<Item, StoreError> {
        let mut map = self.inner.write().await;
        let prior = map.remove(key).ok_or(StoreError::ConditionFailed)?;
        if let Err(e) = self.save(&map).await {
            map.insert(key.to_string(), prior);
            return Err(e);
        }
        Ok(prior)
    }
}
