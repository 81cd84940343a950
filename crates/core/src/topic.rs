//! Topics: the named lists an item can be filed under.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A named bucket for captured text.
///
/// `Inbox` is the default: a chat with no (or an expired) explicit choice files
/// everything there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    #[default]
    Inbox,
    Tasks,
    Reminders,
    Shopping,
}

impl Topic {
    /// All topics, in keyboard order.
    pub const ALL: [Topic; 4] = [Topic::Tasks, Topic::Reminders, Topic::Shopping, Topic::Inbox];

    /// The identifier stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Inbox => "inbox",
            Topic::Tasks => "tasks",
            Topic::Reminders => "reminders",
            Topic::Shopping => "shopping",
        }
    }

    /// Text shown on the topic's keyboard button.
    pub fn button_label(&self) -> &'static str {
        match self {
            Topic::Inbox => "Inbox",
            Topic::Tasks => "Tasks",
            Topic::Reminders => "Reminders",
            Topic::Shopping => "Shopping",
        }
    }

    /// Human-readable name used in acknowledgments ("Added to your shopping list").
    pub fn display_name(&self) -> &'static str {
        match self {
            Topic::Inbox => "inbox",
            Topic::Tasks => "tasks",
            Topic::Reminders => "reminders",
            Topic::Shopping => "shopping list",
        }
    }

    /// Recognise a topic-switch label typed or tapped by the user.
    ///
    /// Matching is case-insensitive and accepts the English button labels,
    /// their Russian equivalents, and `basket` as a synonym for the inbox.
    pub fn from_label(text: &str) -> Option<Topic> {
        match text.trim().to_lowercase().as_str() {
            "inbox" | "basket" | "корзина" => Some(Topic::Inbox),
            "tasks" | "задачи" => Some(Topic::Tasks),
            "reminders" | "напоминания" => Some(Topic::Reminders),
            "shopping" | "покупки" => Some(Topic::Shopping),
            _ => None,
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbox" | "basket" => Ok(Topic::Inbox),
            "tasks" => Ok(Topic::Tasks),
            "reminders" => Ok(Topic::Reminders),
            "shopping" => Ok(Topic::Shopping),
            other => Err(format!("Unknown topic: {other}")),
        }
    }
}
