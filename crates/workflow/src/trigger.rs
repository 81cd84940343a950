//! Triggers and the per-day firing record.

use chrono::{NaiveDate, NaiveTime, Timelike};
use listkeeper_config::{ConfigError, ScheduleConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// What a trigger does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Re-send every active reminder, one message each
    ReminderBroadcast,
    /// Send today's calendar agenda
    MorningDigest,
    /// Delete all reminders
    NightlyWipe,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::ReminderBroadcast => "reminders",
            TriggerKind::MorningDigest => "morning",
            TriggerKind::NightlyWipe => "wipe",
        }
    }
}

/// A (kind, time-of-day) pair. Fires at most once per calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    /// Local time of day; seconds are ignored
    pub at: NaiveTime,
}

impl Trigger {
    pub fn new(kind: TriggerKind, at: NaiveTime) -> Self {
        // Matching is per minute, so drop seconds to keep keys canonical
        let at = at.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(at);
        Self { kind, at }
    }

    /// True when `local` falls inside this trigger's minute.
    pub fn matches(&self, local: NaiveTime) -> bool {
        local.hour() == self.at.hour() && local.minute() == self.at.minute()
    }

    /// All triggers of a `[schedule]` section, in firing order for a shared
    /// minute: morning digest, reminders, wipe. Duplicate times collapse.
    pub fn from_config(config: &ScheduleConfig) -> Result<Vec<Trigger>, ConfigError> {
        let mut triggers = vec![Trigger::new(TriggerKind::MorningDigest, config.morning_digest_time()?)];
        for at in config.reminder_times()? {
            let trigger = Trigger::new(TriggerKind::ReminderBroadcast, at);
            if !triggers.contains(&trigger) {
                triggers.push(trigger);
            }
        }
        triggers.push(Trigger::new(TriggerKind::NightlyWipe, config.nightly_wipe_time()?));
        Ok(triggers)
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.kind.as_str(), self.at.format("%H:%M"))
    }
}

/// The last calendar date each trigger fired on.
///
/// Never cleared: a new date simply compares unequal.
#[derive(Debug, Default)]
pub struct FiringRecord {
    last_fired: Mutex<HashMap<Trigger, NaiveDate>>,
}

impl FiringRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `trigger` fires on `date`. Returns `false` if it already
    /// fired that date.
    pub fn claim(&self, trigger: Trigger, date: NaiveDate) -> bool {
        let mut last_fired = self.last_fired.lock().unwrap_or_else(|e| e.into_inner());
        if last_fired.get(&trigger) == Some(&date) {
            return false;
        }
        last_fired.insert(trigger, date);
        true
    }

    pub fn last_fired(&self, trigger: Trigger) -> Option<NaiveDate> {
        self.last_fired
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&trigger)
            .copied()
    }
}
