//! Key-value storage behind the items handler.
//!
//! The handler never reads before it writes; every mutation goes through one
//! of the conditional operations below, which each backend performs
//! atomically per key.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod json_map_store;
pub mod memory_store;

pub use json_map_store::JsonFileStore;
pub use memory_store::MemoryStore;

/// A schema-free record: field name to JSON value.
pub type Item = Map<String, Value>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key-existence precondition of a conditional write did not hold.
    #[error("conditional check failed")]
    ConditionFailed,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage collaborator consumed by the items handler.
/// Implementations can be in-memory, file-backed, or a remote table.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Name of the table/collection this store serves.
    fn table_name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Item>, StoreError>;

    /// All items, in no particular order.
    async fn scan(&self) -> Result<Vec<Item>, StoreError>;

    /// Write `item` under `key` only if no item with that key exists.
    async fn put_if_absent(&self, key: &str, item: Item) -> Result<(), StoreError>;

    /// Replace the item under `key` only if it exists. Fields named in
    /// `retain` that `item` lacks are carried over from the stored item.
    /// Returns what was stored.
    async fn put_if_present(&self, key: &str, item: Item, retain: &[&str]) -> Result<Item, StoreError>;

    /// Remove the item under `key` only if it exists, returning its prior value.
    async fn delete_if_present(&self, key: &str) -> Result<Item, StoreError>;
}

/// Copy `retain` fields from `stored` into `item` where `item` has none.
pub(crate) fn carry_over(item: &mut Item, stored: &Item, retain: &[&str]) {
    for field in retain {
        if item.contains_key(*field) {
            continue;
        }
        if let Some(v) = stored.get(*field) {
            item.insert((*field).to_string(), v.clone());
        }
    }
}
