//! Daily trigger scheduler: reminder broadcasts, morning digest, nightly wipe.
//!
//! The scheduler polls on a short fixed interval. Each poll converts the
//! current instant into the configured timezone and fires every trigger whose
//! minute matches and which has not fired yet on that local date.
//!
//! Firing is edge-triggered on the (date, minute) pair: any number of polls
//! inside the matching minute fire once, and a minute missed entirely (process
//! paused, clock jump) is skipped for that day rather than fired late.
//!
//! The firing record is committed *before* the action runs, so a failed
//! action is not retried until the next day.

pub mod trigger;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use listkeeper_core::calendar::CalendarSource;
use listkeeper_core::channel::{Channel, Keyboard};
use listkeeper_core::chat::ChatId;
use listkeeper_core::clock::Clock;
use listkeeper_core::error::Error;
use listkeeper_core::render;
use listkeeper_core::store::ItemStore;
use listkeeper_core::topic::Topic;
use listkeeper_session::TargetChat;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use trigger::{FiringRecord, Trigger, TriggerKind};

/// Fires the configured daily triggers against the target chat.
pub struct DailyScheduler {
    triggers: Vec<Trigger>,
    tz: Tz,
    fired: FiringRecord,
    store: Arc<dyn ItemStore>,
    channel: Arc<dyn Channel>,
    calendar: Arc<dyn CalendarSource>,
    target: Arc<TargetChat>,
}

impl DailyScheduler {
    pub fn new(
        triggers: Vec<Trigger>,
        tz: Tz,
        store: Arc<dyn ItemStore>,
        channel: Arc<dyn Channel>,
        calendar: Arc<dyn CalendarSource>,
        target: Arc<TargetChat>,
    ) -> Self {
        Self {
            triggers,
            tz,
            fired: FiringRecord::new(),
            store,
            channel,
            calendar,
            target,
        }
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Evaluate every trigger against `now` and run the newly crossed ones.
    /// Returns the triggers that fired.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<Trigger> {
        let local = now.with_timezone(&self.tz);
        let (today, time) = (local.date_naive(), local.time());

        let due: Vec<Trigger> = self
            .triggers
            .iter()
            .copied()
            .filter(|t| t.matches(time) && self.fired.claim(*t, today))
            .collect();

        for trigger in &due {
            info!(trigger = %trigger, date = %today, "Trigger fired");
            self.fire(*trigger, now).await;
        }
        due
    }

    async fn fire(&self, trigger: Trigger, now: DateTime<Utc>) {
        let chat_id = match self.target.resolve().await {
            Ok(Some(chat_id)) => chat_id,
            Ok(None) => {
                warn!(trigger = %trigger, "No target chat known yet, skipping");
                return;
            }
            Err(e) => {
                error!(trigger = %trigger, error = %e, "Could not resolve target chat");
                return;
            }
        };

        let result = match trigger.kind {
            TriggerKind::ReminderBroadcast => self.broadcast_reminders(chat_id).await.map(|sent| {
                debug!(chat_id = %chat_id, sent, "Reminder broadcast done");
            }),
            TriggerKind::MorningDigest => self.send_digest(chat_id, now).await,
            TriggerKind::NightlyWipe => self.wipe_reminders(chat_id).await.map(|removed| {
                info!(chat_id = %chat_id, removed, "Nightly wipe done");
            }),
        };

        if let Err(e) = result {
            error!(trigger = %trigger, chat_id = %chat_id, error = %e, "Trigger action failed");
        }
    }

    /// One message per active reminder, each with its own completion button.
    async fn broadcast_reminders(&self, chat_id: ChatId) -> Result<usize, Error> {
        let items = self.store.list_active(chat_id, Some(Topic::Reminders)).await?;
        let mut sent = 0;
        for item in &items {
            let keyboard = Keyboard::complete(item.id);
            match self
                .channel
                .send(chat_id, &render::reminder(item), Some(&keyboard))
                .await
            {
                Ok(_) => sent += 1,
                Err(e) => warn!(chat_id = %chat_id, item_id = %item.id, error = %e, "Failed to send reminder"),
            }
        }
        Ok(sent)
    }

    async fn send_digest(&self, chat_id: ChatId, now: DateTime<Utc>) -> Result<(), Error> {
        let agenda = self.calendar.today_agenda(now).await;
        if let Err(e) = &agenda {
            warn!(calendar = self.calendar.name(), error = %e, "Calendar fetch failed, sending placeholder");
        }
        self.channel.send(chat_id, &render::digest(&agenda), None).await?;
        Ok(())
    }

    async fn wipe_reminders(&self, chat_id: ChatId) -> Result<u64, Error> {
        let removed = self.store.delete_all_in_topic(chat_id, Topic::Reminders).await?;
        self.channel.send(chat_id, render::WIPE_DONE, None).await?;
        Ok(removed)
    }

    /// Poll until `cancel` fires. Time is read from `clock` on every poll.
    ///
    /// An action already running when cancellation arrives finishes first.
    pub async fn run(&self, clock: Arc<dyn Clock>, poll_interval: std::time::Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            triggers = self.triggers.len(),
            timezone = %self.tz,
            poll_secs = poll_interval.as_secs(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(clock.now()).await;
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(
        self: Arc<Self>,
        clock: Arc<dyn Clock>,
        poll_interval: std::time::Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(clock, poll_interval, cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveTime, TimeZone};
    use listkeeper_core::clock::ManualClock;
    use listkeeper_core::error::StoreError;
    use listkeeper_core::item::{Item, ItemId};
    use listkeeper_core::testing::{CannedCalendar, RecordingChannel};
    use listkeeper_store::InMemoryStore;

    const CHAT: ChatId = ChatId(500);
    const MOSCOW: Tz = chrono_tz::Europe::Moscow;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// UTC instant for a Moscow (UTC+3) wall-clock time on 2026-03-`day`.
    fn msk(day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        MOSCOW
            .with_ymd_and_hms(2026, 3, day, h, m, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Fixture {
        scheduler: DailyScheduler,
        store: Arc<InMemoryStore>,
        channel: Arc<RecordingChannel>,
    }

    fn fixture(triggers: Vec<Trigger>, target: Option<ChatId>, calendar: CannedCalendar) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let channel = Arc::new(RecordingChannel::new());
        let target = Arc::new(TargetChat::new(target, store.clone()));
        let scheduler = DailyScheduler::new(
            triggers,
            MOSCOW,
            store.clone(),
            channel.clone(),
            Arc::new(calendar),
            target,
        );
        Fixture {
            scheduler,
            store,
            channel,
        }
    }

    fn reminders_at(h: u32, m: u32) -> Vec<Trigger> {
        vec![Trigger::new(TriggerKind::ReminderBroadcast, hm(h, m))]
    }

    async fn add_reminders(store: &InMemoryStore, texts: &[&str]) -> Vec<ItemId> {
        let mut ids = Vec::new();
        for text in texts {
            ids.push(store.add(CHAT, Topic::Reminders, text, Utc::now()).await.unwrap());
        }
        ids
    }

    #[tokio::test]
    async fn fires_exactly_once_within_the_minute() {
        let f = fixture(reminders_at(8, 0), Some(CHAT), CannedCalendar::ok(""));
        add_reminders(&f.store, &["stretch"]).await;

        for s in [0, 15, 30, 45, 59] {
            f.scheduler.tick(msk(1, 8, 0, s)).await;
        }
        assert_eq!(f.channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn fires_again_on_the_next_date() {
        let f = fixture(reminders_at(8, 0), Some(CHAT), CannedCalendar::ok(""));
        add_reminders(&f.store, &["stretch"]).await;

        assert_eq!(f.scheduler.tick(msk(1, 8, 0, 5)).await.len(), 1);
        assert!(f.scheduler.tick(msk(1, 8, 0, 20)).await.is_empty());
        assert_eq!(f.scheduler.tick(msk(2, 8, 0, 5)).await.len(), 1);
        assert!(f.scheduler.tick(msk(2, 8, 0, 50)).await.is_empty());
        assert_eq!(f.channel.sent().len(), 2);
    }

    #[tokio::test]
    async fn missed_minute_is_skipped_not_fired_late() {
        let f = fixture(reminders_at(8, 0), Some(CHAT), CannedCalendar::ok(""));
        add_reminders(&f.store, &["stretch"]).await;

        f.scheduler.tick(msk(1, 7, 59, 50)).await;
        f.scheduler.tick(msk(1, 8, 1, 5)).await;
        assert!(f.channel.sent().is_empty());
    }

    #[tokio::test]
    async fn matches_in_configured_timezone() {
        let f = fixture(reminders_at(8, 0), Some(CHAT), CannedCalendar::ok(""));
        add_reminders(&f.store, &["stretch"]).await;

        // 08:00 UTC is 11:00 in Moscow
        f.scheduler.tick(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()).await;
        assert!(f.channel.sent().is_empty());
        // 05:00 UTC is 08:00 in Moscow
        f.scheduler.tick(Utc.with_ymd_and_hms(2026, 3, 1, 5, 0, 0).unwrap()).await;
        assert_eq!(f.channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn three_reminders_three_messages_with_distinct_buttons() {
        let f = fixture(reminders_at(14, 0), Some(CHAT), CannedCalendar::ok(""));
        let ids = add_reminders(&f.store, &["call mom", "pay rent", "water plants"]).await;
        f.store.add(CHAT, Topic::Tasks, "not a reminder", Utc::now()).await.unwrap();

        f.scheduler.tick(msk(1, 14, 0, 0)).await;

        let sent = f.channel.sent_to(CHAT);
        assert_eq!(sent.len(), 3);
        let buttons: Vec<Keyboard> = sent.iter().filter_map(|m| m.keyboard.clone()).collect();
        assert_eq!(buttons, ids.iter().map(|id| Keyboard::complete(*id)).collect::<Vec<_>>());
        assert_eq!(sent[0].text, "🔔 call mom");
    }

    #[tokio::test]
    async fn no_reminders_no_messages() {
        let f = fixture(reminders_at(14, 0), Some(CHAT), CannedCalendar::ok(""));
        let fired = f.scheduler.tick(msk(1, 14, 0, 0)).await;
        assert_eq!(fired.len(), 1);
        assert!(f.channel.sent().is_empty());
    }

    #[tokio::test]
    async fn nightly_wipe_runs_once_per_date() {
        let wipe = vec![Trigger::new(TriggerKind::NightlyWipe, hm(3, 0))];
        let f = fixture(wipe, Some(CHAT), CannedCalendar::ok(""));
        add_reminders(&f.store, &["a", "b", "c", "d", "e"]).await;
        f.store.add(CHAT, Topic::Shopping, "milk", Utc::now()).await.unwrap();

        f.scheduler.tick(msk(1, 3, 0, 0)).await;
        assert!(f.store.list_active(CHAT, Some(Topic::Reminders)).await.unwrap().is_empty());
        assert_eq!(f.store.list_active(CHAT, Some(Topic::Shopping)).await.unwrap().len(), 1);
        assert_eq!(f.channel.sent().len(), 1);
        assert_eq!(f.channel.sent()[0].text, render::WIPE_DONE);

        // Items re-added later that minute survive the next poll
        add_reminders(&f.store, &["late one", "another"]).await;
        f.scheduler.tick(msk(1, 3, 0, 30)).await;
        assert_eq!(f.store.list_active(CHAT, Some(Topic::Reminders)).await.unwrap().len(), 2);
        assert_eq!(f.channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn morning_digest_sends_agenda() {
        let digest = vec![Trigger::new(TriggerKind::MorningDigest, hm(8, 0))];
        let f = fixture(digest, Some(CHAT), CannedCalendar::ok("• 09:30 Standup"));

        f.scheduler.tick(msk(1, 8, 0, 0)).await;
        let sent = f.channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "TODAY'S AGENDA:\n• 09:30 Standup");
        assert_eq!(sent[0].keyboard, None);
    }

    #[tokio::test]
    async fn calendar_failure_sends_placeholder() {
        let digest = vec![Trigger::new(TriggerKind::MorningDigest, hm(8, 0))];
        let f = fixture(digest, Some(CHAT), CannedCalendar::failing("connection refused"));

        f.scheduler.tick(msk(1, 8, 0, 0)).await;
        let sent = f.channel.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("Calendar error"));
        assert!(sent[0].text.contains("connection refused"));
    }

    #[tokio::test]
    async fn no_target_chat_is_a_noop() {
        let triggers = vec![
            Trigger::new(TriggerKind::MorningDigest, hm(8, 0)),
            Trigger::new(TriggerKind::ReminderBroadcast, hm(8, 0)),
            Trigger::new(TriggerKind::NightlyWipe, hm(8, 0)),
        ];
        let f = fixture(triggers, None, CannedCalendar::ok("agenda"));
        add_reminders(&f.store, &["keep me"]).await;

        let fired = f.scheduler.tick(msk(1, 8, 0, 0)).await;
        assert_eq!(fired.len(), 3);
        assert!(f.channel.sent().is_empty());
        assert_eq!(f.store.list_active(CHAT, Some(Topic::Reminders)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn learned_target_chat_is_used() {
        let f = fixture(reminders_at(8, 0), None, CannedCalendar::ok(""));
        add_reminders(&f.store, &["stretch"]).await;
        f.scheduler.target.learn(CHAT).await.unwrap();

        f.scheduler.tick(msk(1, 8, 0, 0)).await;
        assert_eq!(f.channel.sent_to(CHAT).len(), 1);
    }

    /// A store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl ItemStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }
        async fn add(&self, _: ChatId, _: Topic, _: &str, _: DateTime<Utc>) -> Result<ItemId, StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
        async fn list_active(&self, _: ChatId, _: Option<Topic>) -> Result<Vec<Item>, StoreError> {
            Err(StoreError::QueryFailed("disk gone".into()))
        }
        async fn mark_done(&self, _: ChatId, _: ItemId) -> Result<bool, StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
        async fn delete_all_in_topic(&self, _: ChatId, _: Topic) -> Result<u64, StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
        async fn get_setting(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::QueryFailed("disk gone".into()))
        }
        async fn set_setting(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_is_not_retried_same_day() {
        let store: Arc<dyn ItemStore> = Arc::new(BrokenStore);
        let channel = Arc::new(RecordingChannel::new());
        let scheduler = DailyScheduler::new(
            reminders_at(8, 0),
            MOSCOW,
            store.clone(),
            channel.clone(),
            Arc::new(CannedCalendar::ok("")),
            Arc::new(TargetChat::new(Some(CHAT), store)),
        );

        assert_eq!(scheduler.tick(msk(1, 8, 0, 0)).await.len(), 1);
        // Record was committed before the failing action
        assert!(scheduler.tick(msk(1, 8, 0, 15)).await.is_empty());
        assert!(channel.sent().is_empty());
        assert_eq!(scheduler.tick(msk(2, 8, 0, 0)).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_fires_once_and_stops_on_cancel() {
        let f = fixture(reminders_at(8, 0), Some(CHAT), CannedCalendar::ok(""));
        add_reminders(&f.store, &["stretch"]).await;
        let channel = f.channel.clone();
        let scheduler = Arc::new(f.scheduler);

        let clock = Arc::new(ManualClock::new(msk(1, 8, 0, 0)));
        let cancel = CancellationToken::new();
        let handle = scheduler.clone().spawn(
            clock.clone(),
            std::time::Duration::from_secs(15),
            cancel.clone(),
        );

        // Several polls land on the same frozen minute
        tokio::time::sleep(std::time::Duration::from_secs(50)).await;
        assert_eq!(channel.sent().len(), 1);

        // Next day, same minute
        clock.advance(Duration::days(1));
        tokio::time::sleep(std::time::Duration::from_secs(20)).await;
        assert_eq!(channel.sent().len(), 2);

        cancel.cancel();
        handle.await.unwrap();

        // Nothing fires after shutdown
        clock.advance(Duration::days(1));
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert_eq!(channel.sent().len(), 2);
    }
}
