//! User-facing message texts, shared by the dispatcher and the scheduler.

use crate::error::CalendarError;
use crate::item::Item;
use crate::topic::Topic;

pub const WELCOME: &str = "Hi! I keep your lists. Pick one with the buttons below, \
then just type: every message goes to the current list.";

pub const MENU: &str = "Main menu";

pub const EMPTY_TEXT_PROMPT: &str = "Send me some text and I'll add it to the current list.";

pub const GENERIC_FAILURE: &str = "Something went wrong, please try again.";

pub const WIPE_DONE: &str = "Reminders cleared (nightly wipe).";

/// Reply to an explicit topic switch.
pub fn topic_switched(topic: Topic) -> String {
    format!("Current list: {}", topic.display_name())
}

/// Acknowledgment after free text was captured.
pub fn added(topic: Topic) -> String {
    format!("Added to {}.", topic.display_name())
}

/// A single reminder, sent with its own completion button.
pub fn reminder(item: &Item) -> String {
    format!("🔔 {}", item.text)
}

/// New text for a message whose item was just completed.
pub fn completed(original: Option<&str>) -> String {
    match original {
        Some(text) if !text.trim().is_empty() => format!("✅ {text}"),
        _ => "✅ Done".to_string(),
    }
}

/// Aggregated listing of a non-reminders topic.
pub fn topic_listing(topic: Topic, items: &[Item]) -> String {
    if items.is_empty() {
        return format!("Your {} is empty.", topic.display_name());
    }
    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(n, item)| format!("{}) {}", n + 1, item.text))
        .collect();
    format!("{}:\n{}", topic.button_label(), lines.join("\n"))
}

/// Morning digest body; calendar failures are shown, not dropped.
pub fn digest(agenda: &Result<String, CalendarError>) -> String {
    match agenda {
        Ok(text) => format!("TODAY'S AGENDA:\n{text}"),
        Err(e) => format!("TODAY'S AGENDA:\nCalendar error: {e}"),
    }
}
