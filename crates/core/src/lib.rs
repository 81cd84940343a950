//! # Listkeeper Core
//!
//! Domain types, traits, and error definitions for the Listkeeper chat
//! assistant. This crate has **no framework dependencies**: it defines the
//! model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is a trait here (the chat [`Channel`], the
//! [`ItemStore`], the [`CalendarSource`], the [`Clock`]). Implementations live
//! in their own crates, so the session and scheduling engine can be driven by
//! in-process doubles and a manual clock in tests.

pub mod calendar;
pub mod channel;
pub mod chat;
pub mod clock;
pub mod error;
pub mod item;
pub mod render;
pub mod store;
pub mod topic;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export key types at crate root for ergonomics
pub use calendar::CalendarSource;
pub use channel::{Channel, InboundEvent, InboundKind, Keyboard};
pub use chat::{ChatId, MessageId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use item::{Item, ItemId, ItemStatus};
pub use store::ItemStore;
pub use topic::Topic;
