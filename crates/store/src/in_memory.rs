//! In-memory store: useful for testing and ephemeral runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listkeeper_core::chat::ChatId;
use listkeeper_core::error::StoreError;
use listkeeper_core::item::{Item, ItemId, ItemStatus};
use listkeeper_core::store::ItemStore;
use listkeeper_core::topic::Topic;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    items: Vec<Item>,
    settings: HashMap<String, String>,
    last_id: i64,
}

/// An in-memory store that keeps items in a Vec.
/// Nothing survives the process; the write half of the lock serializes writers.
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn add(
        &self,
        chat_id: ChatId,
        topic: Topic,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ItemId, StoreError> {
        let mut tables = self.tables.write().await;
        tables.last_id += 1;
        let id = ItemId(tables.last_id);
        tables.items.push(Item {
            id,
            chat_id,
            topic,
            text: text.to_string(),
            created_at,
            status: ItemStatus::Active,
        });
        Ok(id)
    }

    async fn list_active(&self, chat_id: ChatId, topic: Option<Topic>) -> Result<Vec<Item>, StoreError> {
        let tables = self.tables.read().await;
        // Vec order is id order: ids only ever grow
        Ok(tables
            .items
            .iter()
            .filter(|i| i.chat_id == chat_id && i.is_active())
            .filter(|i| topic.is_none_or(|t| i.topic == t))
            .cloned()
            .collect())
    }

    async fn mark_done(&self, chat_id: ChatId, id: ItemId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables
            .items
            .iter_mut()
            .find(|i| i.id == id && i.chat_id == chat_id && i.is_active())
        {
            Some(item) => {
                item.status = ItemStatus::Done;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_all_in_topic(&self, chat_id: ChatId, topic: Topic) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let len_before = tables.items.len();
        tables.items.retain(|i| !(i.chat_id == chat_id && i.topic == topic));
        Ok((len_before - tables.items.len()) as u64)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tables.read().await.settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
