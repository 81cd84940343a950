//! Minimal iCalendar (RFC 5545) reader.
//!
//! Only what the digest needs: `VEVENT` blocks with `SUMMARY` and `DTSTART`.
//! Recurrence rules are not expanded; a recurring event shows up on the day
//! of its first occurrence only.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use listkeeper_core::error::CalendarError;
use tracing::debug;

/// When an event starts.
#[derive(Debug, Clone, PartialEq)]
pub enum EventStart {
    AllDay(NaiveDate),
    /// Already converted to the calendar's display timezone
    At(DateTime<Tz>),
}

impl EventStart {
    pub fn date(&self) -> NaiveDate {
        match self {
            EventStart::AllDay(date) => *date,
            EventStart::At(at) => at.date_naive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub summary: String,
    pub start: EventStart,
}

/// Parse every event in `body`. Times are converted into `tz`; floating times
/// (no `Z`, no `TZID`) are read as `tz` local time.
pub fn parse_events(body: &str, tz: Tz) -> Result<Vec<Event>, CalendarError> {
    if !body.contains("BEGIN:VCALENDAR") {
        return Err(CalendarError::Parse("not an iCalendar document".into()));
    }

    let mut events = Vec::new();
    let mut current: Option<(Option<String>, Option<EventStart>)> = None;

    for line in unfold(body) {
        let Some((head, value)) = line.split_once(':') else {
            continue;
        };
        let mut parts = head.split(';');
        let name = parts.next().unwrap_or_default().to_ascii_uppercase();
        let params: Vec<&str> = parts.collect();

        match (name.as_str(), value) {
            ("BEGIN", "VEVENT") => current = Some((None, None)),
            ("END", "VEVENT") => {
                if let Some((summary, start)) = current.take() {
                    match start {
                        Some(start) => events.push(Event {
                            summary: summary.unwrap_or_else(|| "(no title)".into()),
                            start,
                        }),
                        None => debug!("Skipping VEVENT without a usable DTSTART"),
                    }
                }
            }
            ("SUMMARY", _) => {
                if let Some((summary, _)) = current.as_mut() {
                    *summary = Some(unescape(value));
                }
            }
            ("DTSTART", _) => {
                if let Some((_, start)) = current.as_mut() {
                    *start = parse_start(&params, value, tz);
                }
            }
            _ => {}
        }
    }

    Ok(events)
}

/// Join folded continuation lines (leading space or tab) onto their parent.
fn unfold(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in body.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix([' ', '\t'])
            && let Some(last) = lines.last_mut()
        {
            last.push_str(rest);
        } else if !raw.is_empty() {
            lines.push(raw.to_string());
        }
    }
    lines
}

fn parse_start(params: &[&str], value: &str, tz: Tz) -> Option<EventStart> {
    let value = value.trim();
    let is_date = params.iter().any(|p| p.eq_ignore_ascii_case("VALUE=DATE")) || value.len() == 8;
    if is_date {
        return NaiveDate::parse_from_str(value, "%Y%m%d").ok().map(EventStart::AllDay);
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(EventStart::At(naive.and_utc().with_timezone(&tz)));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    let source_tz = params
        .iter()
        .find_map(|p| p.strip_prefix("TZID="))
        .and_then(|id| id.trim_matches('"').parse::<Tz>().ok())
        .unwrap_or(tz);
    let local = source_tz.from_local_datetime(&naive).earliest()?;
    Some(EventStart::At(local.with_timezone(&tz)))
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
