//! Target chat: where scheduler-originated messages are sent.
//!
//! Resolution order: configured chat, then the chat learned from the most
//! recent inbound event, then the value persisted in the store's settings
//! table (so a restart does not forget it).

use listkeeper_core::chat::ChatId;
use listkeeper_core::error::StoreError;
use listkeeper_core::store::{ItemStore, TARGET_CHAT_KEY};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub struct TargetChat {
    configured: Option<ChatId>,
    learned: Mutex<Option<ChatId>>,
    /// Last value known to be in the store
    persisted: Mutex<Option<ChatId>>,
    store: Arc<dyn ItemStore>,
}

impl TargetChat {
    pub fn new(configured: Option<ChatId>, store: Arc<dyn ItemStore>) -> Self {
        Self {
            configured,
            learned: Mutex::new(None),
            persisted: Mutex::new(None),
            store,
        }
    }

    pub fn configured(&self) -> Option<ChatId> {
        self.configured
    }

    /// Record `chat_id` as the most recently active chat. Writes to the store
    /// until a write of that value succeeds; a failed write is retried on the
    /// next call.
    pub async fn learn(&self, chat_id: ChatId) -> Result<(), StoreError> {
        *self.learned.lock().unwrap_or_else(|e| e.into_inner()) = Some(chat_id);
        if *self.persisted.lock().unwrap_or_else(|e| e.into_inner()) == Some(chat_id) {
            return Ok(());
        }

        self.store
            .set_setting(TARGET_CHAT_KEY, &chat_id.to_string())
            .await?;
        *self.persisted.lock().unwrap_or_else(|e| e.into_inner()) = Some(chat_id);
        info!(chat_id = %chat_id, "Learned target chat");
        Ok(())
    }

    /// The chat to address, if any is known.
    pub async fn resolve(&self) -> Result<Option<ChatId>, StoreError> {
        if let Some(chat_id) = self.configured {
            return Ok(Some(chat_id));
        }
        if let Some(chat_id) = *self.learned.lock().unwrap_or_else(|e| e.into_inner()) {
            return Ok(Some(chat_id));
        }

        let Some(raw) = self.store.get_setting(TARGET_CHAT_KEY).await? else {
            debug!("No target chat configured or learned yet");
            return Ok(None);
        };
        match raw.parse::<ChatId>() {
            Ok(chat_id) => {
                self.learned
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .get_or_insert(chat_id);
                self.persisted
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .get_or_insert(chat_id);
                Ok(Some(chat_id))
            }
            Err(e) => {
                warn!(value = %raw, error = %e, "Ignoring unparseable persisted target chat");
                Ok(None)
            }
        }
    }
}
