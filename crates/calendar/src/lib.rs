//! Calendar sources for the morning digest.
//!
//! - [`DisabledCalendar`]: answers with a "not configured" line
//! - [`IcsCalendar`]: fetches an iCalendar feed and lists today's events
//!
//! Use [`from_config`] to pick one from the `[calendar]` section.

pub mod ics;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use listkeeper_config::CalendarConfig;
use listkeeper_core::calendar::CalendarSource;
use listkeeper_core::error::CalendarError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::ics::{Event, EventStart};

/// Placeholder returned when no calendar is set up.
pub const NOT_CONFIGURED: &str = "Calendar is not configured (set calendar.ics_url or CALENDAR_ICS_URL).";

/// Build the calendar source described by `config`.
pub fn from_config(config: &CalendarConfig, tz: Tz) -> Result<Arc<dyn CalendarSource>, CalendarError> {
    match (&config.ics_url, config.enabled) {
        (Some(url), true) => {
            info!("Calendar digest from ICS feed");
            Ok(Arc::new(IcsCalendar::new(
                url,
                tz,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        _ => {
            info!("Calendar digest disabled");
            Ok(Arc::new(DisabledCalendar))
        }
    }
}

/// A calendar that is switched off.
pub struct DisabledCalendar;

#[async_trait]
impl CalendarSource for DisabledCalendar {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn today_agenda(&self, _now: DateTime<Utc>) -> Result<String, CalendarError> {
        Ok(NOT_CONFIGURED.to_string())
    }
}

/// Reads today's events from an iCalendar (`.ics`) feed over HTTP.
pub struct IcsCalendar {
    url: String,
    tz: Tz,
    client: reqwest::Client,
}

impl IcsCalendar {
    pub fn new(url: impl Into<String>, tz: Tz, timeout: Duration) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            tz,
            client,
        })
    }

    async fn fetch(&self) -> Result<String, CalendarError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CalendarError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Request(format!("feed returned HTTP {}", status.as_u16())));
        }

        response
            .text()
            .await
            .map_err(|e| CalendarError::Request(e.without_url().to_string()))
    }
}

#[async_trait]
impl CalendarSource for IcsCalendar {
    fn name(&self) -> &str {
        "ics"
    }

    async fn today_agenda(&self, now: DateTime<Utc>) -> Result<String, CalendarError> {
        let body = self.fetch().await?;
        let events = ics::parse_events(&body, self.tz)?;
        debug!(events = events.len(), "Fetched calendar feed");
        Ok(format_agenda(events, now, self.tz))
    }
}

/// Today's events (in `tz`), all-day first, then by start time.
pub fn format_agenda(events: Vec<Event>, now: DateTime<Utc>, tz: Tz) -> String {
    let today = now.with_timezone(&tz).date_naive();
    let mut todays: Vec<Event> = events.into_iter().filter(|e| e.start.date() == today).collect();
    if todays.is_empty() {
        return "No events today.".to_string();
    }

    todays.sort_by_key(|e| match &e.start {
        EventStart::AllDay(_) => None,
        EventStart::At(at) => Some(at.time()),
    });

    todays
        .iter()
        .map(|e| match &e.start {
            EventStart::AllDay(_) => format!("• all day: {}", e.summary),
            EventStart::At(at) => format!("• {} {}", at.format("%H:%M"), e.summary),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    const MOSCOW: Tz = chrono_tz::Europe::Moscow;

    fn at(h: u32, m: u32) -> EventStart {
        EventStart::At(MOSCOW.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap())
    }

    fn event(summary: &str, start: EventStart) -> Event {
        Event {
            summary: summary.into(),
            start,
        }
    }

    #[tokio::test]
    async fn disabled_calendar_returns_placeholder() {
        let agenda = DisabledCalendar.today_agenda(Utc::now()).await.unwrap();
        assert_eq!(agenda, NOT_CONFIGURED);
    }

    #[test]
    fn from_config_without_url_is_disabled() {
        let source = from_config(&CalendarConfig::default(), MOSCOW).unwrap();
        assert_eq!(source.name(), "disabled");
    }

    #[test]
    fn from_config_respects_enabled_flag() {
        let config = CalendarConfig {
            enabled: false,
            ics_url: Some("https://example.com/cal.ics".into()),
            ..CalendarConfig::default()
        };
        assert_eq!(from_config(&config, MOSCOW).unwrap().name(), "disabled");

        let config = CalendarConfig {
            enabled: true,
            ..config
        };
        assert_eq!(from_config(&config, MOSCOW).unwrap().name(), "ics");
    }

    #[test]
    fn agenda_lists_only_today_sorted() {
        // 2026-03-01 05:00 UTC is 08:00 in Moscow
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 5, 0, 0).unwrap();
        let events = vec![
            event("Lunch", at(13, 0)),
            event("Yesterday", EventStart::AllDay(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap())),
            event("Standup", at(9, 30)),
            event("Holiday", EventStart::AllDay(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())),
        ];
        assert_eq!(
            format_agenda(events, now, MOSCOW),
            "• all day: Holiday\n• 09:30 Standup\n• 13:00 Lunch"
        );
    }

    #[test]
    fn agenda_uses_local_date_not_utc_date() {
        // 22:30 UTC on Feb 28 is already March 1 in Moscow
        let now = Utc.with_ymd_and_hms(2026, 2, 28, 22, 30, 0).unwrap();
        let events = vec![event("Early flight", at(6, 0))];
        assert_eq!(format_agenda(events, now, MOSCOW), "• 06:00 Early flight");
    }

    #[test]
    fn empty_day_says_so() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 5, 0, 0).unwrap();
        assert_eq!(format_agenda(Vec::new(), now, MOSCOW), "No events today.");
    }
}
