//! Telegram channel adapter.
//!
//! Talks to the Telegram Bot API over HTTPS with `reqwest`:
//! - inbound: long-polling `getUpdates` (text messages and button presses)
//! - outbound: `sendMessage` with a reply keyboard (topic buttons) or an inline
//!   `✅` button, `editMessageText`, `editMessageReplyMarkup`,
//!   `answerCallbackQuery`

use async_trait::async_trait;
use listkeeper_config::TelegramSettings;
use listkeeper_core::channel::{Channel, InboundEvent, InboundKind, Keyboard};
use listkeeper_core::chat::{ChatId, MessageId};
use listkeeper_core::error::ChannelError;
use listkeeper_core::topic::Topic;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pause before retrying after a failed `getUpdates`.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Allowed numeric user IDs. Empty = deny all, ["*"] = allow all.
    pub allowed_users: Vec<String>,
    /// Bot API base URL (overridable for a local Bot API server).
    pub api_url: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub long_poll_secs: u64,
}

impl TelegramConfig {
    pub fn from_settings(bot_token: impl Into<String>, settings: &TelegramSettings) -> Self {
        Self {
            bot_token: bot_token.into(),
            allowed_users: settings.allowed_users.clone(),
            api_url: settings.api_url.clone(),
            long_poll_secs: u64::from(settings.long_poll_secs),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("allowed_users", &self.allowed_users)
            .field("api_url", &self.api_url)
            .field("long_poll_secs", &self.long_poll_secs)
            .finish()
    }
}

// ── Bot API wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T, ChannelError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                reason: format!(
                    "{method} failed ({}): {}",
                    self.error_code.unwrap_or_default(),
                    self.description.unwrap_or_else(|| "no description".into())
                ),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}

impl TgUser {
    fn display_name(&self) -> Option<String> {
        self.username.clone().or_else(|| self.first_name.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: TgUser,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    data: Option<String>,
}

/// Map an update to an inbound event. Non-text messages and other update
/// kinds yield `None`.
fn update_to_event(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        // Without the message, a private chat's id equals the user's id
        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);
        return Some(InboundEvent {
            chat_id: ChatId(chat_id),
            sender_id: query.from.id.to_string(),
            sender_name: query.from.display_name(),
            kind: InboundKind::Activation {
                activation_id: query.id,
                message_id: query.message.as_ref().map(|m| MessageId(m.message_id)),
                message_text: query.message.and_then(|m| m.text),
                data: query.data.unwrap_or_default(),
            },
        });
    }

    let message = update.message?;
    let text = message.text?;
    let (sender_id, sender_name) = match &message.from {
        Some(user) => (user.id.to_string(), user.display_name()),
        None => (message.chat.id.to_string(), None),
    };
    Some(InboundEvent {
        chat_id: ChatId(message.chat.id),
        sender_id,
        sender_name,
        kind: InboundKind::from_text(&text),
    })
}

/// `reply_markup` for an outbound message.
fn reply_markup(keyboard: &Keyboard) -> serde_json::Value {
    match keyboard {
        Keyboard::Topics => {
            let mut row: Vec<serde_json::Value> = Topic::ALL
                .iter()
                .map(|t| serde_json::json!({ "text": t.button_label() }))
                .collect();
            row.push(serde_json::json!({ "text": "Menu" }));
            serde_json::json!({ "keyboard": [row], "resize_keyboard": true })
        }
        Keyboard::Complete { .. } => serde_json::json!({
            "inline_keyboard": [[{
                "text": "✅",
                "callback_data": keyboard.callback_data().unwrap_or_default(),
            }]]
        }),
    }
}

// ── HTTP client ─────────────────────────────────────────────────────────────

/// Cheap to clone: `reqwest::Client` is reference counted.
#[derive(Clone)]
struct BotApi {
    client: reqwest::Client,
    /// `{api_url}/bot{token}`; never logged
    base: String,
}

impl BotApi {
    async fn call<T: DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T, ChannelError> {
        let url = format!("{}/{method}", self.base);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                // The URL embeds the bot token
                reason: format!("{method}: {}", e.without_url()),
            })?;

        let parsed: ApiResponse<T> = response.json().await.map_err(|e| {
            ChannelError::InvalidPayload(format!("{method}: {}", e.without_url()))
        })?;
        parsed.into_result(method)
    }
}

async fn poll_updates(api: BotApi, long_poll_secs: u64, tx: mpsc::Sender<Result<InboundEvent, ChannelError>>) {
    let mut offset: i64 = 0;
    loop {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": long_poll_secs,
            "allowed_updates": ["message", "callback_query"],
        });

        match api.call::<Vec<Update>>("getUpdates", &body).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(event) = update_to_event(update) else {
                        continue;
                    };
                    if tx.send(Ok(event)).await.is_err() {
                        debug!("Inbound receiver dropped, stopping Telegram poller");
                        return;
                    }
                }
            }
            Err(e) => {
                if tx.is_closed() {
                    return;
                }
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    api: BotApi,
    poller: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self, ChannelError> {
        if config.bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured("Telegram bot token is empty".into()));
        }
        // Must outlive the long-poll timeout
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.long_poll_secs + 15))
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;
        let api = BotApi {
            client,
            base: format!("{}/bot{}", config.api_url.trim_end_matches('/'), config.bot_token),
        };

        Ok(Self {
            config,
            api,
            poller: tokio::sync::Mutex::new(None),
        })
    }

    fn delivery_error(reason: impl Into<String>) -> ChannelError {
        ChannelError::DeliveryFailed {
            channel: "telegram".into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(poll_updates(self.api.clone(), self.config.long_poll_secs, tx));
        if let Some(previous) = self.poller.lock().await.replace(handle) {
            previous.abort();
        }
        info!(long_poll_secs = self.config.long_poll_secs, "Telegram channel started");
        Ok(rx)
    }

    async fn send(&self, chat_id: ChatId, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageId, ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id.0,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }

        let sent: TgMessage = self.api.call("sendMessage", &body).await?;
        debug!(chat_id = %chat_id, message_id = sent.message_id, "Telegram message sent");
        Ok(MessageId(sent.message_id))
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id.0,
            "message_id": message_id.0,
            "text": text,
        });
        // Result is the edited Message, or `true` for inline messages
        self.api
            .call::<serde_json::Value>("editMessageText", &body)
            .await
            .map(|_| ())
    }

    async fn remove_keyboard(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id.0,
            "message_id": message_id.0,
            "reply_markup": { "inline_keyboard": [] },
        });
        self.api
            .call::<serde_json::Value>("editMessageReplyMarkup", &body)
            .await
            .map(|_| ())
    }

    async fn answer_activation(&self, activation_id: &str, text: Option<&str>) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({ "callback_query_id": activation_id });
        if let Some(text) = text {
            body["text"] = serde_json::json!(text);
        }
        let answered: bool = self.api.call("answerCallbackQuery", &body).await?;
        if answered {
            Ok(())
        } else {
            Err(Self::delivery_error("answerCallbackQuery returned false"))
        }
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        if self.config.allowed_users.is_empty() {
            return false;
        }
        if self.config.allowed_users.iter().any(|u| u == "*") {
            return true;
        }
        self.config.allowed_users.iter().any(|u| u == sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        let me: serde_json::Value = self.api.call("getMe", &serde_json::json!({})).await?;
        Ok(me.get("is_bot").and_then(|v| v.as_bool()).unwrap_or(false))
    }
}
