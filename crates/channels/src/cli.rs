//! CLI channel: the assistant in a terminal.
//!
//! Reads lines from stdin, prints replies to stdout. Every line comes from one
//! fixed local chat. Completion buttons are printed as a hint; typing
//! `!done <n>` presses the button on message `n`.

use async_trait::async_trait;
use listkeeper_core::channel::{Channel, InboundEvent, InboundKind, Keyboard};
use listkeeper_core::chat::{ChatId, MessageId};
use listkeeper_core::error::ChannelError;
use listkeeper_core::topic::Topic;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Sender id used for every terminal event.
pub const LOCAL_SENDER: &str = "local_user";

/// Buttons currently shown, by message id: (callback data, message text).
type Buttons = Arc<Mutex<HashMap<i64, (String, String)>>>;

/// Interactive terminal channel.
pub struct CliChannel {
    chat_id: ChatId,
    next_message_id: AtomicI64,
    buttons: Buttons,
}

impl CliChannel {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            next_message_id: AtomicI64::new(1),
            buttons: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    fn buttons(&self) -> std::sync::MutexGuard<'_, HashMap<i64, (String, String)>> {
        self.buttons.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Turn one typed line into an event kind. Exit words yield `None`.
fn parse_line(line: &str, buttons: &Buttons) -> Option<InboundKind> {
    let trimmed = line.trim();
    if matches!(trimmed, "exit" | "quit" | ":q") {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("!done") {
        let number = rest.trim();
        let pressed = number
            .parse::<i64>()
            .ok()
            .and_then(|n| buttons.lock().unwrap_or_else(|e| e.into_inner()).get(&n).cloned().map(|b| (n, b)));
        return Some(match pressed {
            Some((n, (data, text))) => InboundKind::Activation {
                activation_id: format!("cli-{n}"),
                message_id: Some(MessageId(n)),
                message_text: Some(text),
                data,
            },
            // Unknown message: an activation nothing will match
            None => InboundKind::Activation {
                activation_id: format!("cli-{number}"),
                message_id: None,
                message_text: None,
                data: String::new(),
            },
        });
    }

    Some(InboundKind::from_text(line))
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let chat_id = self.chat_id;
        let buttons = self.buttons.clone();

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(kind) = parse_line(&line, &buttons) else {
                            break;
                        };
                        let event = InboundEvent {
                            chat_id,
                            sender_id: LOCAL_SENDER.into(),
                            sender_name: Some("You".into()),
                            kind,
                        };
                        if tx.send(Ok(event)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, _chat_id: ChatId, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageId, ChannelError> {
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        println!("[{id}] {text}");
        match keyboard {
            Some(Keyboard::Topics) => {
                let labels: Vec<&str> = Topic::ALL.iter().map(|t| t.button_label()).collect();
                println!("     ({} | Menu)", labels.join(" | "));
            }
            Some(button @ Keyboard::Complete { .. }) => {
                if let Some(data) = button.callback_data() {
                    self.buttons().insert(id, (data, text.to_string()));
                    println!("     ✅ type `!done {id}`");
                }
            }
            None => {}
        }
        Ok(MessageId(id))
    }

    async fn edit_text(&self, _chat_id: ChatId, message_id: MessageId, text: &str) -> Result<(), ChannelError> {
        println!("[{message_id}] ✏️ {text}");
        Ok(())
    }

    async fn remove_keyboard(&self, _chat_id: ChatId, message_id: MessageId) -> Result<(), ChannelError> {
        self.buttons().remove(&message_id.0);
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // CLI is always allowed (local user)
    }
}
