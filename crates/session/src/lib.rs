//! Session state shared by the dispatch loop and the scheduler.
//!
//! - [`SessionRegistry`]: per-chat current topic with TTL-based reset
//! - [`TargetChat`]: the chat that scheduler-originated messages go to

pub mod registry;
pub mod target;

pub use registry::{Session, SessionRegistry};
pub use target::TargetChat;
