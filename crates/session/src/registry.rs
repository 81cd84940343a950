//! Session registry: in-memory map from chat to current topic.
//!
//! A topic other than inbox is only valid while `now - last_activity <= ttl`.
//! Expiry is applied lazily by [`SessionRegistry::touch`], which is the only
//! path free-text capture uses to pick a destination topic.
//!
//! All operations share one `Mutex`. The lock is never held across an
//! `.await`, so callers are free to send messages right after a call returns.

use chrono::{DateTime, Duration, Utc};
use listkeeper_core::chat::ChatId;
use listkeeper_core::clock::Clock;
use listkeeper_core::topic::Topic;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Snapshot of one chat's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub topic: Topic,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            topic: Topic::Inbox,
            last_activity: now,
        }
    }
}

pub struct SessionRegistry {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<ChatId, Session>>,
}

impl SessionRegistry {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Existing session, or a new inbox session stamped with the current time.
    pub fn get_or_create(&self, chat_id: ChatId) -> Session {
        let now = self.clock.now();
        *self.lock().entry(chat_id).or_insert_with(|| Session::fresh(now))
    }

    /// Like [`get_or_create`](Self::get_or_create), but resets a stale topic
    /// back to inbox and always refreshes `last_activity`.
    pub fn touch(&self, chat_id: ChatId) -> Session {
        let now = self.clock.now();
        let mut sessions = self.lock();
        let session = sessions.entry(chat_id).or_insert_with(|| Session::fresh(now));

        if session.topic != Topic::Inbox && now - session.last_activity > self.ttl {
            debug!(chat_id = %chat_id, topic = %session.topic, "Session topic expired, back to inbox");
            session.topic = Topic::Inbox;
        }
        session.last_activity = now;
        *session
    }

    /// Explicit topic switch. Always succeeds, no TTL check.
    pub fn set_topic(&self, chat_id: ChatId, topic: Topic) -> Session {
        let now = self.clock.now();
        let session = Session {
            topic,
            last_activity: now,
        };
        self.lock().insert(chat_id, session);
        debug!(chat_id = %chat_id, topic = %topic, "Session topic set");
        session
    }

    pub fn reset(&self, chat_id: ChatId) -> Session {
        self.set_topic(chat_id, Topic::Inbox)
    }

    /// Number of chats seen since startup.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, Session>> {
        // A panic while holding the lock cannot leave a half-written Session
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use listkeeper_core::clock::ManualClock;

    const CHAT: ChatId = ChatId(42);

    fn registry() -> (SessionRegistry, Arc<ManualClock>) {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        (SessionRegistry::new(Duration::minutes(10), clock.clone()), clock)
    }

    #[test]
    fn get_or_create_starts_in_inbox() {
        let (reg, clock) = registry();
        let s = reg.get_or_create(CHAT);
        assert_eq!(s.topic, Topic::Inbox);
        assert_eq!(s.last_activity, clock.now());
        assert_eq!(reg.len(), 1);

        // Does not refresh an existing session
        clock.advance(Duration::minutes(3));
        assert_eq!(reg.get_or_create(CHAT), s);
    }

    #[test]
    fn touch_within_ttl_keeps_topic() {
        let (reg, clock) = registry();
        reg.set_topic(CHAT, Topic::Tasks);
        for _ in 0..5 {
            clock.advance(Duration::minutes(9));
            assert_eq!(reg.touch(CHAT).topic, Topic::Tasks);
        }
    }

    #[test]
    fn touch_after_ttl_resets_to_inbox() {
        let (reg, clock) = registry();
        for topic in [Topic::Tasks, Topic::Reminders, Topic::Shopping] {
            reg.set_topic(CHAT, topic);
            clock.advance(Duration::minutes(11));
            let s = reg.touch(CHAT);
            assert_eq!(s.topic, Topic::Inbox);
            // The reset itself counts as activity
            assert_eq!(s.last_activity, clock.now());
        }
    }

    #[test]
    fn touch_at_exactly_ttl_keeps_topic() {
        let (reg, clock) = registry();
        reg.set_topic(CHAT, Topic::Shopping);
        clock.advance(Duration::minutes(10));
        assert_eq!(reg.touch(CHAT).topic, Topic::Shopping);
    }

    #[test]
    fn set_topic_ignores_staleness() {
        let (reg, clock) = registry();
        reg.set_topic(CHAT, Topic::Tasks);
        clock.advance(Duration::hours(5));
        let s = reg.set_topic(CHAT, Topic::Reminders);
        assert_eq!(s.topic, Topic::Reminders);
        assert_eq!(reg.touch(CHAT).topic, Topic::Reminders);
    }

    #[test]
    fn reset_goes_back_to_inbox() {
        let (reg, _clock) = registry();
        reg.set_topic(CHAT, Topic::Tasks);
        assert_eq!(reg.reset(CHAT).topic, Topic::Inbox);
        assert_eq!(reg.get_or_create(CHAT).topic, Topic::Inbox);
    }

    #[test]
    fn chats_are_independent() {
        let (reg, clock) = registry();
        reg.set_topic(ChatId(1), Topic::Tasks);
        clock.advance(Duration::minutes(8));
        reg.set_topic(ChatId(2), Topic::Shopping);
        clock.advance(Duration::minutes(4));

        assert_eq!(reg.touch(ChatId(1)).topic, Topic::Inbox);
        assert_eq!(reg.touch(ChatId(2)).topic, Topic::Shopping);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn concurrent_access_is_consistent() {
        let (reg, _clock) = registry();
        let reg = Arc::new(reg);
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        reg.set_topic(ChatId(n), Topic::Tasks);
                        assert_eq!(reg.touch(ChatId(n)).topic, Topic::Tasks);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.len(), 8);
    }
}
