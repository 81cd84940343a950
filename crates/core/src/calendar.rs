//! CalendarSource trait: where the morning digest gets its agenda.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CalendarError;

/// A source of "today's agenda" text.
///
/// Failures are expected (network, misconfiguration); callers substitute a
/// visible placeholder rather than dropping the digest.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Source name for logging (e.g., "ics", "disabled").
    fn name(&self) -> &str;

    /// Pre-formatted agenda for the calendar day containing `now`.
    async fn today_agenda(&self, now: DateTime<Utc>) -> Result<String, CalendarError>;
}
