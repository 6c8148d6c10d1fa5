use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

use super::{carry_over, Item, KvStore, StoreError};

/// In-process store on a sharded concurrent map.
///
/// Conditional writes hold the shard lock of their key for the whole
/// check-and-mutate, so they are atomic per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: String,
    items: DashMap<String, Item>,
}

impl MemoryStore {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into(), items: DashMap::new() }
    }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

#[async_trait]
impl KvStore for MemoryStore {
    fn table_name(&self) -> &str { &self.table }

    async fn get(&self, key: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.items.get(key).map(|e| e.value().clone()))
    }

    async fn scan(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.items.iter().map(|e| e.value().clone()).collect())
    }

    async fn put_if_absent(&self, key: &str, item: Item) -> Result<(), StoreError> {
        match self.items.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StoreError::ConditionFailed),
            Entry::Vacant(slot) => {
                slot.insert(item);
                Ok(())
            }
        }
    }

    async fn put_if_present(&self, key: &str, mut item: Item, retain: &[&str]) -> Result<Item, StoreError> {
        match self.items.entry(key.to_string()) {
            Entry::Vacant(_) => Err(StoreError::ConditionFailed),
            Entry::Occupied(mut slot) => {
                carry_over(&mut item, slot.get(), retain);
                slot.insert(item.clone());
                Ok(item)
            }
        }
    }

    async fn delete_if_present(&self, key: &str) -> Result<Item, StoreError> {
        self.items
            .remove(key)
            .map(|(_, prior)| prior)
            .ok_or(StoreError::ConditionFailed)
    }
}
