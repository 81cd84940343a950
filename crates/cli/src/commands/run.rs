//! `listkeeper run`: Telegram bot with the daily scheduler.

use super::runtime::Runtime;
use listkeeper_channels::{TelegramChannel, TelegramConfig};
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let token = config.require_bot_token()?;

    let channel = Arc::new(TelegramChannel::new(TelegramConfig::from_settings(
        token,
        &config.telegram,
    ))?);
    let runtime = Runtime::assemble(&config, channel).await?;

    println!("🗂️  Listkeeper — starting");
    println!("   Database: {}", config.db_path);
    println!("   Timezone: {}", config.timezone);
    println!("   Topic expiry: {} min", config.session.ttl_minutes);
    let triggers: Vec<String> = runtime.scheduler().triggers().iter().map(|t| t.to_string()).collect();
    println!("   Triggers: {}", triggers.join(", "));
    match config.target_chat_id {
        Some(id) => println!("   Target chat: {id}"),
        None => println!("   Target chat: learned from the first message"),
    }
    println!("   Press Ctrl-C to stop.\n");

    runtime.serve().await
}
