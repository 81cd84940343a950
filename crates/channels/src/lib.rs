//! Chat channel implementations for Listkeeper.
//!
//! Each channel connects to a chat platform, yields inbound user events and
//! delivers outbound messages with their keyboards.
//!
//! Available channels:
//! - **Telegram**: Telegram Bot API via long polling
//! - **CLI**: Interactive terminal chat (stdin/stdout)

pub mod cli;
pub mod telegram;

pub use cli::CliChannel;
pub use telegram::{TelegramChannel, TelegramConfig};
