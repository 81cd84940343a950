//! ItemStore trait: durable storage for captured items and settings.
//!
//! The store is a key-ordered append/soft-delete table of items plus a small
//! key-value table for settings that must survive a restart (the learned
//! target chat). Implementations must serialize writes; a single global write
//! lock is sufficient.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::chat::ChatId;
use crate::error::StoreError;
use crate::item::{Item, ItemId};
use crate::topic::Topic;

/// Settings key under which the learned target chat is persisted.
pub const TARGET_CHAT_KEY: &str = "target_chat_id";

/// The core ItemStore trait.
///
/// Implementations: SQLite (default), in-memory (for testing).
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append a new active item and return its identifier.
    async fn add(
        &self,
        chat_id: ChatId,
        topic: Topic,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ItemId, StoreError>;

    /// Active items of a chat, optionally restricted to one topic, ordered by
    /// id ascending (insertion order).
    async fn list_active(
        &self,
        chat_id: ChatId,
        topic: Option<Topic>,
    ) -> Result<Vec<Item>, StoreError>;

    /// Mark an item done. Scoped to the chat: an id belonging to another chat
    /// is left untouched. Returns `true` only if an active item transitioned.
    async fn mark_done(&self, chat_id: ChatId, id: ItemId) -> Result<bool, StoreError>;

    /// Permanently remove every item of a chat's topic. Returns the number removed.
    async fn delete_all_in_topic(&self, chat_id: ChatId, topic: Topic) -> Result<u64, StoreError>;

    /// Read a persisted setting.
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write (or overwrite) a persisted setting.
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
