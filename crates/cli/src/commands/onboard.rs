//! `listkeeper onboard`: First-time setup.

use listkeeper_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::config_file(config_path);

    println!("🗂️  Listkeeper — First-Time Setup");
    println!("=================================\n");

    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        std::fs::create_dir_all(dir)?;
        println!("✅ Created config directory: {}", dir.display());
    }

    if config_path.exists() {
        println!("  Config file exists: {}", config_path.display());
        println!("  (left untouched)");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config file: {}", config_path.display());
    }

    println!("\n📋 Next steps:");
    println!("  1. Set BOT_TOKEN (or bot_token in the config file)");
    println!("  2. Optionally set CHAT_ID to pin the chat that gets reminders");
    println!("  3. Run `listkeeper doctor` to check the setup");
    println!("  4. Run `listkeeper run` to start the bot");

    Ok(())
}
