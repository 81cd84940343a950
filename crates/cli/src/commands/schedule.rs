//! `listkeeper schedule`: Show the configured triggers.

use chrono::{Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use listkeeper_workflow::Trigger;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let tz = config.tz()?;
    let triggers = Trigger::from_config(&config.schedule)?;

    let now = Utc::now().with_timezone(&tz);
    println!("🕒 Schedule ({tz}, now {})", now.format("%Y-%m-%d %H:%M"));
    println!("   Polling every {}s\n", config.schedule.poll_interval_secs);

    let mut rows: Vec<(Trigger, String)> = triggers
        .into_iter()
        .map(|t| (t, next_fire(t.at, now.date_naive(), now.time(), tz)))
        .collect();
    rows.sort_by(|a, b| a.1.cmp(&b.1));

    for (trigger, next) in rows {
        println!("  {:<10} {}   next: {}", trigger.kind.as_str(), trigger.at.format("%H:%M"), next);
    }

    Ok(())
}

/// Next local date-time `at` comes round, today if still ahead.
fn next_fire(at: NaiveTime, today: NaiveDate, now: NaiveTime, tz: Tz) -> String {
    let date = if at > now { Some(today) } else { today.checked_add_days(Days::new(1)) };
    date.and_then(|d| tz.from_local_datetime(&d.and_time(at)).earliest())
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "skipped (clock change)".into())
}
