//! In-process doubles for tests across the workspace.
//!
//! Enabled with the `testing` feature (always on for this crate's own tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::mpsc;

use crate::calendar::CalendarSource;
use crate::channel::{Channel, InboundEvent, InboundKind, Keyboard};
use crate::chat::{ChatId, MessageId};
use crate::error::{CalendarError, ChannelError};

/// A message captured by [`RecordingChannel::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// A channel that records everything sent through it and lets tests inject
/// inbound events.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<(ChatId, MessageId, String)>>,
    removed_keyboards: Mutex<Vec<(ChatId, MessageId)>>,
    answered: Mutex<Vec<String>>,
    next_message_id: AtomicI64,
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<InboundEvent, ChannelError>>>>,
    /// `None` allows every sender
    allowed: Option<Vec<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that only lets the given senders through.
    pub fn allowing(senders: &[&str]) -> Self {
        Self {
            allowed: Some(senders.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<SentMessage> {
        self.sent().into_iter().filter(|m| m.chat_id == chat_id).collect()
    }

    pub fn edits(&self) -> Vec<(ChatId, MessageId, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn removed_keyboards(&self) -> Vec<(ChatId, MessageId)> {
        self.removed_keyboards.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.edits.lock().unwrap().clear();
        self.removed_keyboards.lock().unwrap().clear();
        self.answered.lock().unwrap().clear();
    }

    /// Inject an event as if it came from the platform.
    pub async fn inject(&self, event: InboundEvent) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(event))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Event channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, ChannelError> {
        let message_id = MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(message_id)
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), ChannelError> {
        self.edits
            .lock()
            .unwrap()
            .push((chat_id, message_id, text.to_string()));
        Ok(())
    }

    async fn remove_keyboard(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), ChannelError> {
        self.removed_keyboards.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }

    async fn answer_activation(&self, activation_id: &str, _text: Option<&str>) -> Result<(), ChannelError> {
        self.answered.lock().unwrap().push(activation_id.to_string());
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.allowed
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|s| s == sender_id))
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        *self.inject_tx.lock().await = None;
        Ok(())
    }
}

/// A calendar that returns canned agenda text, or fails on demand.
pub struct CannedCalendar {
    response: Result<String, CalendarError>,
}

impl CannedCalendar {
    pub fn ok(agenda: impl Into<String>) -> Self {
        Self {
            response: Ok(agenda.into()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            response: Err(CalendarError::Request(reason.into())),
        }
    }
}

#[async_trait]
impl CalendarSource for CannedCalendar {
    fn name(&self) -> &str {
        "canned"
    }

    async fn today_agenda(&self, _now: DateTime<Utc>) -> Result<String, CalendarError> {
        self.response.clone()
    }
}

/// Shorthand for an inbound text event.
pub fn text_event(chat_id: ChatId, text: &str) -> InboundEvent {
    InboundEvent {
        chat_id,
        sender_id: chat_id.to_string(),
        sender_name: None,
        kind: InboundKind::from_text(text),
    }
}

/// Shorthand for a completion-button press on `message_id`.
pub fn activation_event(chat_id: ChatId, message_id: MessageId, data: &str) -> InboundEvent {
    InboundEvent {
        chat_id,
        sender_id: chat_id.to_string(),
        sender_name: None,
        kind: InboundKind::Activation {
            activation_id: format!("cb-{message_id}"),
            message_id: Some(message_id),
            message_text: Some("🔔 reminder".into()),
            data: data.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_channel_assigns_increasing_ids() {
        let ch = RecordingChannel::new();
        let a = ch.send(ChatId(1), "one", None).await.unwrap();
        let b = ch.send(ChatId(1), "two", Some(&Keyboard::Topics)).await.unwrap();
        assert!(b.0 > a.0);
        assert_eq!(ch.sent().len(), 2);
        assert_eq!(ch.sent()[1].keyboard, Some(Keyboard::Topics));
    }

    #[tokio::test]
    async fn inject_requires_start() {
        let ch = RecordingChannel::new();
        assert!(ch.inject(text_event(ChatId(1), "hi")).await.is_err());

        let mut rx = ch.start().await.unwrap();
        ch.inject(text_event(ChatId(1), "hi")).await.unwrap();
        let got = rx.recv().await.unwrap().unwrap();
        assert_eq!(got.kind, InboundKind::Text { text: "hi".into() });
    }
}
