//! `listkeeper items`: List active items of a chat.

use listkeeper_core::chat::ChatId;
use listkeeper_core::store::ItemStore;
use listkeeper_core::topic::Topic;
use listkeeper_store::SqliteStore;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    chat_id: i64,
    topic: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let topic = topic.map(|t| t.to_lowercase().parse::<Topic>()).transpose()?;

    let store = SqliteStore::new(&config.db_path).await?;
    let items = store.list_active(ChatId(chat_id), topic).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No active items.");
        return Ok(());
    }

    for topic in Topic::ALL {
        let in_topic: Vec<_> = items.iter().filter(|i| i.topic == topic).collect();
        if in_topic.is_empty() {
            continue;
        }
        println!("📂 {} ({})", topic.button_label(), in_topic.len());
        for item in in_topic {
            println!(
                "  #{:<5} {}  {}",
                item.id.0,
                item.created_at.format("%Y-%m-%d %H:%M"),
                item.text
            );
        }
    }

    Ok(())
}
