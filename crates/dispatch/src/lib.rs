//! Dispatch coordinator: turns one inbound chat event into store mutations
//! and a few outbound messages.
//!
//! Routing rules:
//!
//! 1. `/start`, `/menu` or the "Menu" button → reset the session to inbox, show the menu
//! 2. A topic label ("Tasks", "Покупки", …) → switch topic, list that topic
//! 3. Blank text → clarifying prompt, nothing stored
//! 4. Any other text → `touch` the session (TTL), store under the resulting topic
//! 5. A `done:<id>` button press → mark the item done, strike the message
//!
//! Every event from an allowed sender also teaches the [`TargetChat`] its chat.

use listkeeper_core::channel::{Channel, InboundEvent, InboundKind, Keyboard};
use listkeeper_core::chat::{ChatId, MessageId};
use listkeeper_core::clock::Clock;
use listkeeper_core::error::ChannelError;
use listkeeper_core::item::ItemId;
use listkeeper_core::render;
use listkeeper_core::store::ItemStore;
use listkeeper_core::topic::Topic;
use listkeeper_session::{SessionRegistry, TargetChat};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What handling an event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Welcome or menu shown, session reset
    Menu,
    /// Explicit topic switch
    TopicSwitched(Topic),
    /// Free text stored
    Captured { topic: Topic, item_id: ItemId },
    /// Blank text, prompt sent
    EmptyText,
    /// An active item was marked done
    Completed(ItemId),
    /// Nothing to do (unknown command, stale or malformed button)
    Ignored,
    /// Sender not on the allowlist
    Rejected,
    /// A store operation failed; the user was told
    Failed,
}

pub struct Dispatcher {
    sessions: Arc<SessionRegistry>,
    store: Arc<dyn ItemStore>,
    channel: Arc<dyn Channel>,
    target: Arc<TargetChat>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        store: Arc<dyn ItemStore>,
        channel: Arc<dyn Channel>,
        target: Arc<TargetChat>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            store,
            channel,
            target,
            clock,
        }
    }

    /// Handle a single inbound event.
    pub async fn handle(&self, event: InboundEvent) -> Outcome {
        let chat_id = event.chat_id;
        if !self.channel.is_allowed(&event.sender_id) {
            warn!(chat_id = %chat_id, sender_id = %event.sender_id, "Ignoring sender not on allowlist");
            return Outcome::Rejected;
        }

        if let Err(e) = self.target.learn(chat_id).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to persist target chat");
        }

        match event.kind {
            InboundKind::Command { name, .. } => match name.as_str() {
                "start" => self.show_menu(chat_id, render::WELCOME).await,
                "menu" => self.show_menu(chat_id, render::MENU).await,
                other => {
                    debug!(chat_id = %chat_id, command = %other, "Ignoring unknown command");
                    Outcome::Ignored
                }
            },
            InboundKind::Text { text } => {
                if let Some(topic) = Topic::from_label(&text) {
                    self.switch_topic(chat_id, topic).await
                } else if is_menu_label(&text) {
                    self.show_menu(chat_id, render::MENU).await
                } else if text.trim().is_empty() {
                    self.reply(chat_id, render::EMPTY_TEXT_PROMPT, None).await;
                    Outcome::EmptyText
                } else {
                    self.capture(chat_id, &text).await
                }
            }
            InboundKind::Activation {
                activation_id,
                message_id,
                message_text,
                data,
            } => {
                self.complete(chat_id, &activation_id, message_id, message_text.as_deref(), &data)
                    .await
            }
        }
    }

    async fn show_menu(&self, chat_id: ChatId, text: &str) -> Outcome {
        self.sessions.reset(chat_id);
        self.reply(chat_id, text, Some(&Keyboard::Topics)).await;
        Outcome::Menu
    }

    async fn switch_topic(&self, chat_id: ChatId, topic: Topic) -> Outcome {
        self.sessions.set_topic(chat_id, topic);
        info!(chat_id = %chat_id, topic = %topic, "Topic switched");

        let items = match self.store.list_active(chat_id, Some(topic)).await {
            Ok(items) => items,
            Err(e) => {
                warn!(chat_id = %chat_id, topic = %topic, error = %e, "Failed to list items");
                self.reply(chat_id, render::GENERIC_FAILURE, Some(&Keyboard::Topics)).await;
                return Outcome::Failed;
            }
        };

        if topic == Topic::Reminders && !items.is_empty() {
            self.reply(chat_id, &render::topic_switched(topic), Some(&Keyboard::Topics))
                .await;
            for item in &items {
                self.reply(chat_id, &render::reminder(item), Some(&Keyboard::complete(item.id)))
                    .await;
            }
        } else {
            let text = format!(
                "{}\n\n{}",
                render::topic_switched(topic),
                render::topic_listing(topic, &items)
            );
            self.reply(chat_id, &text, Some(&Keyboard::Topics)).await;
        }
        Outcome::TopicSwitched(topic)
    }

    async fn capture(&self, chat_id: ChatId, text: &str) -> Outcome {
        let session = self.sessions.touch(chat_id);
        match self
            .store
            .add(chat_id, session.topic, text, self.clock.now())
            .await
        {
            Ok(item_id) => {
                debug!(chat_id = %chat_id, topic = %session.topic, item_id = %item_id, "Captured text");
                self.reply(chat_id, &render::added(session.topic), Some(&Keyboard::Topics))
                    .await;
                Outcome::Captured {
                    topic: session.topic,
                    item_id,
                }
            }
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Failed to store item");
                self.reply(chat_id, render::GENERIC_FAILURE, Some(&Keyboard::Topics)).await;
                Outcome::Failed
            }
        }
    }

    async fn complete(
        &self,
        chat_id: ChatId,
        activation_id: &str,
        message_id: Option<MessageId>,
        message_text: Option<&str>,
        data: &str,
    ) -> Outcome {
        // Always answer, or the client keeps a spinner on the button
        if let Err(e) = self.channel.answer_activation(activation_id, None).await {
            debug!(error = %e, "Failed to answer activation");
        }

        let Some(item_id) = Keyboard::parse_completion(data) else {
            debug!(chat_id = %chat_id, data = %data, "Ignoring unrecognized button payload");
            return Outcome::Ignored;
        };

        match self.store.mark_done(chat_id, item_id).await {
            Ok(true) => {
                info!(chat_id = %chat_id, item_id = %item_id, "Item completed");
                if let Some(message_id) = message_id {
                    log_send_error(
                        self.channel
                            .edit_text(chat_id, message_id, &render::completed(message_text))
                            .await,
                    );
                    log_send_error(self.channel.remove_keyboard(chat_id, message_id).await);
                }
                Outcome::Completed(item_id)
            }
            Ok(false) => {
                debug!(chat_id = %chat_id, item_id = %item_id, "Item already done or unknown");
                Outcome::Ignored
            }
            Err(e) => {
                warn!(chat_id = %chat_id, item_id = %item_id, error = %e, "Failed to complete item");
                self.reply(chat_id, render::GENERIC_FAILURE, None).await;
                Outcome::Failed
            }
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str, keyboard: Option<&Keyboard>) {
        log_send_error(self.channel.send(chat_id, text, keyboard).await.map(|_| ()));
    }

    /// Process events in arrival order until the stream ends or `cancel` fires.
    ///
    /// Cancellation is checked between events; one already being handled runs
    /// to completion.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<Result<InboundEvent, ChannelError>>,
        cancel: CancellationToken,
    ) {
        info!(channel = self.channel.name(), "Dispatcher started");
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Dispatcher stopping");
                    break;
                }
                next = events.recv() => next,
            };

            match next {
                Some(Ok(event)) => {
                    let outcome = self.handle(event).await;
                    debug!(?outcome, "Event handled");
                }
                Some(Err(e)) => warn!(error = %e, "Channel delivered an error"),
                None => {
                    info!("Inbound stream closed, dispatcher exiting");
                    break;
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(
        self: Arc<Self>,
        events: mpsc::Receiver<Result<InboundEvent, ChannelError>>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(events, cancel).await })
    }
}

fn is_menu_label(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "menu" | "меню")
}

fn log_send_error(result: Result<(), ChannelError>) {
    if let Err(e) = result {
        warn!(error = %e, "Outbound message failed");
    }
}
