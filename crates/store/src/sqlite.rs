//! SQLite item store.
//!
//! Uses a single SQLite database file with two tables:
//! - `items`: captured text, one row per item, soft-deleted via `status`
//! - `settings`: small key-value table (the learned target chat)
//!
//! Reads go through the connection pool; every write additionally takes a
//! single store-wide lock so concurrent writers (dispatch loop, scheduler) are
//! serialized in the order they acquire it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listkeeper_core::chat::ChatId;
use listkeeper_core::error::StoreError;
use listkeeper_core::item::{Item, ItemId, ItemStatus};
use listkeeper_core::store::ItemStore;
use listkeeper_core::topic::Topic;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A production SQLite item store.
pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // An in-memory database lives and dies with its connection
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!("SQLite item store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run schema migrations: creates tables and indexes.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id     INTEGER NOT NULL,
                topic       TEXT NOT NULL,
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'active'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("items table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_items_chat_topic_status ON items(chat_id, topic, status)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("items index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key         TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("settings table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse an `Item` from a SQLite row.
    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<Item, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let chat_id: i64 = row
            .try_get("chat_id")
            .map_err(|e| StoreError::QueryFailed(format!("chat_id column: {e}")))?;
        let topic: String = row
            .try_get("topic")
            .map_err(|e| StoreError::QueryFailed(format!("topic column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let status: String = row
            .try_get("status")
            .map_err(|e| StoreError::QueryFailed(format!("status column: {e}")))?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("created_at value {created_at_str:?}: {e}")))?;

        Ok(Item {
            id: ItemId(id),
            chat_id: ChatId(chat_id),
            topic: Topic::from_str(&topic).map_err(StoreError::QueryFailed)?,
            text,
            created_at,
            status: ItemStatus::from_str(&status).map_err(StoreError::QueryFailed)?,
        })
    }
}

#[async_trait]
impl ItemStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn add(
        &self,
        chat_id: ChatId,
        topic: Topic,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ItemId, StoreError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            "INSERT INTO items (chat_id, topic, text, created_at, status) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(chat_id.0)
        .bind(topic.as_str())
        .bind(text)
        .bind(created_at.to_rfc3339())
        .bind(ItemStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        let id = ItemId(result.last_insert_rowid());
        debug!(chat_id = %chat_id, topic = %topic, item_id = %id, "Stored item");
        Ok(id)
    }

    async fn list_active(&self, chat_id: ChatId, topic: Option<Topic>) -> Result<Vec<Item>, StoreError> {
        let rows = match topic {
            Some(topic) => {
                sqlx::query(
                    "SELECT * FROM items WHERE chat_id = ?1 AND topic = ?2 AND status = ?3 ORDER BY id",
                )
                .bind(chat_id.0)
                .bind(topic.as_str())
                .bind(ItemStatus::Active.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM items WHERE chat_id = ?1 AND status = ?2 ORDER BY id")
                    .bind(chat_id.0)
                    .bind(ItemStatus::Active.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| StoreError::QueryFailed(format!("SELECT active items: {e}")))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn mark_done(&self, chat_id: ChatId, id: ItemId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("UPDATE items SET status = ?1 WHERE chat_id = ?2 AND id = ?3 AND status = ?4")
            .bind(ItemStatus::Done.as_str())
            .bind(chat_id.0)
            .bind(id.0)
            .bind(ItemStatus::Active.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_in_topic(&self, chat_id: ChatId, topic: Topic) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM items WHERE chat_id = ?1 AND topic = ?2")
            .bind(chat_id.0)
            .bind(topic.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT setting: {e}")))?;

        row.map(|r| {
            r.try_get::<String, _>("value")
                .map_err(|e| StoreError::QueryFailed(format!("value column: {e}")))
        })
        .transpose()
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT setting failed: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: ChatId = ChatId(1001);
    const OTHER: ChatId = ChatId(2002);

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn add_and_list_in_insertion_order() {
        let store = test_store().await;
        let a = store.add(CHAT, Topic::Tasks, "write report", Utc::now()).await.unwrap();
        let b = store.add(CHAT, Topic::Tasks, "call Bob", Utc::now()).await.unwrap();
        store.add(CHAT, Topic::Shopping, "eggs", Utc::now()).await.unwrap();
        assert!(b > a);

        let tasks = store.list_active(CHAT, Some(Topic::Tasks)).await.unwrap();
        let texts: Vec<&str> = tasks.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["write report", "call Bob"]);
        assert!(tasks.iter().all(|i| i.topic == Topic::Tasks && i.is_active()));

        let all = store.list_active(CHAT, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn text_is_stored_verbatim() {
        let store = test_store().await;
        let raw = "  Купить молоко 🥛 -- 'quoted' \"and\" ; DROP TABLE items; ";
        store.add(CHAT, Topic::Inbox, raw, Utc::now()).await.unwrap();
        let items = store.list_active(CHAT, Some(Topic::Inbox)).await.unwrap();
        assert_eq!(items[0].text, raw);
    }

    #[tokio::test]
    async fn mark_done_is_scoped_and_idempotent() {
        let store = test_store().await;
        let id = store.add(CHAT, Topic::Reminders, "stretch", Utc::now()).await.unwrap();

        // Another chat cannot complete it
        assert!(!store.mark_done(OTHER, id).await.unwrap());
        assert!(store.mark_done(CHAT, id).await.unwrap());
        // Second activation is a no-op
        assert!(!store.mark_done(CHAT, id).await.unwrap());
        // Unknown id is a no-op
        assert!(!store.mark_done(CHAT, ItemId(9999)).await.unwrap());

        assert!(store.list_active(CHAT, Some(Topic::Reminders)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_all_in_topic_only_touches_that_chat_and_topic() {
        let store = test_store().await;
        for text in ["a", "b", "c"] {
            store.add(CHAT, Topic::Reminders, text, Utc::now()).await.unwrap();
        }
        store.add(CHAT, Topic::Tasks, "keep me", Utc::now()).await.unwrap();
        store.add(OTHER, Topic::Reminders, "not mine", Utc::now()).await.unwrap();

        assert_eq!(store.delete_all_in_topic(CHAT, Topic::Reminders).await.unwrap(), 3);
        assert!(store.list_active(CHAT, Some(Topic::Reminders)).await.unwrap().is_empty());
        assert_eq!(store.list_active(CHAT, Some(Topic::Tasks)).await.unwrap().len(), 1);
        assert_eq!(store.list_active(OTHER, Some(Topic::Reminders)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settings_upsert() {
        let store = test_store().await;
        assert_eq!(store.get_setting("target_chat_id").await.unwrap(), None);
        store.set_setting("target_chat_id", "1").await.unwrap();
        store.set_setting("target_chat_id", "2").await.unwrap();
        assert_eq!(store.get_setting("target_chat_id").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn items_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::new(path).await.unwrap();
            store.add(CHAT, Topic::Shopping, "bread", Utc::now()).await.unwrap();
            store.set_setting("target_chat_id", "1001").await.unwrap();
            store.pool.close().await;
        }

        let store = SqliteStore::new(path).await.unwrap();
        let items = store.list_active(CHAT, Some(Topic::Shopping)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "bread");
        assert_eq!(store.get_setting("target_chat_id").await.unwrap().as_deref(), Some("1001"));
    }

    #[tokio::test]
    async fn concurrent_writers_get_unique_ids() {
        let store = std::sync::Arc::new(test_store().await);
        let mut handles = Vec::new();
        for n in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add(CHAT, Topic::Inbox, &format!("note {n}"), Utc::now())
                    .await
                    .unwrap()
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
        assert_eq!(store.list_active(CHAT, None).await.unwrap().len(), 20);
    }
}
