//! Channel trait: the abstraction over chat transports.
//!
//! A Channel connects Listkeeper to a messaging platform (Telegram, the local
//! terminal). It yields inbound user events and delivers outbound messages,
//! optionally carrying an interactive keyboard.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatId, MessageId};
use crate::error::ChannelError;
use crate::item::ItemId;

/// Callback-data prefix of the completion button.
const COMPLETE_PREFIX: &str = "done:";

/// Interactive affordance attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Keyboard {
    /// Persistent reply keyboard: one button per topic plus "Menu".
    Topics,
    /// Inline `✅` button that marks the given item done.
    Complete { item_id: ItemId },
}

impl Keyboard {
    pub fn complete(item_id: ItemId) -> Self {
        Keyboard::Complete { item_id }
    }

    /// Payload carried back by the transport when the button is pressed.
    pub fn callback_data(&self) -> Option<String> {
        match self {
            Keyboard::Topics => None,
            Keyboard::Complete { item_id } => Some(format!("{COMPLETE_PREFIX}{item_id}")),
        }
    }

    /// Parse a completion payload (`done:<id>`). Anything else yields `None`.
    pub fn parse_completion(data: &str) -> Option<ItemId> {
        data.strip_prefix(COMPLETE_PREFIX)?.parse().ok()
    }
}

/// One inbound user action, tagged with the chat it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub chat_id: ChatId,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    pub kind: InboundKind,
}

/// What the user did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundKind {
    /// A slash command such as `/start` (name without the slash or `@bot` suffix)
    Command { name: String, args: String },

    /// Plain text: either a topic label or content to capture
    Text { text: String },

    /// A pressed inline button
    Activation {
        /// Transport handle used to answer the activation
        activation_id: String,
        /// The message carrying the button
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
        /// The message's text at the time of the press
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_text: Option<String>,
        data: String,
    },
}

impl InboundKind {
    /// Classify raw message text as a command or plain text.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim_start();
        if let Some(rest) = trimmed.strip_prefix('/') {
            let (head, args) = match rest.split_once(char::is_whitespace) {
                Some((head, args)) => (head, args.trim()),
                None => (rest, ""),
            };
            // "/start@my_bot" addresses a specific bot in group chats
            let name = head.split('@').next().unwrap_or(head);
            if !name.is_empty() {
                return InboundKind::Command {
                    name: name.to_lowercase(),
                    args: args.to_string(),
                };
            }
        }
        InboundKind::Text {
            text: text.to_string(),
        }
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, message
/// formatting, and sender authorization. Delivery of inbound events is
/// at-least-once.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Start listening for inbound events.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<InboundEvent, ChannelError>>,
        ChannelError,
    >;

    /// Send a message to a chat, returning the transport's message id.
    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> std::result::Result<MessageId, ChannelError>;

    /// Replace the text of a previously sent message.
    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> std::result::Result<(), ChannelError>;

    /// Strip the inline keyboard from a previously sent message.
    async fn remove_keyboard(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> std::result::Result<(), ChannelError>;

    /// Acknowledge a button press (dismisses the client's spinner).
    async fn answer_activation(
        &self,
        _activation_id: &str,
        _text: Option<&str>,
    ) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
