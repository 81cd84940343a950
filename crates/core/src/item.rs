//! Items: the persisted pieces of text filed under a topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::chat::ChatId;
use crate::topic::Topic;

/// Store-assigned item identifier. Monotonic and unique per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ItemId)
    }
}

/// Lifecycle of an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Active,
    Done,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Done => "done",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ItemStatus::Active),
            "done" => Ok(ItemStatus::Done),
            other => Err(format!("Unknown item status: {other}")),
        }
    }
}

/// A single captured entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,

    /// The chat the item was captured in
    pub chat_id: ChatId,

    pub topic: Topic,

    /// The captured text, stored verbatim
    pub text: String,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub status: ItemStatus,
}

impl Item {
    pub fn is_active(&self) -> bool {
        self.status == ItemStatus::Active
    }
}
