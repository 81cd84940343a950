//! `listkeeper chat`: the assistant in this terminal.

use super::runtime::Runtime;
use listkeeper_channels::CliChannel;
use listkeeper_core::chat::ChatId;
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: Option<&Path>, chat_id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let channel = Arc::new(CliChannel::new(ChatId(chat_id)));
    let runtime = Runtime::assemble(&config, channel).await?;

    println!("🗂️  Listkeeper — terminal chat (chat {chat_id})");
    println!("   Type a topic name (Tasks, Reminders, Shopping, Inbox) to switch,");
    println!("   anything else to capture it. `!done <n>` presses ✅ on message n.");
    println!("   Type 'exit' or Ctrl-D to quit.\n");

    runtime.serve().await
}
