//! `listkeeper doctor`: Diagnose configuration and database.

use chrono::Utc;
use listkeeper_channels::{TelegramChannel, TelegramConfig};
use listkeeper_core::calendar::CalendarSource;
use listkeeper_core::channel::Channel;
use listkeeper_core::store::ItemStore;
use listkeeper_store::SqliteStore;
use listkeeper_workflow::Trigger;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Listkeeper Doctor — System Diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    let file = super::config_file(config_path);
    if file.exists() {
        println!("  ✅ Config file found: {}", file.display());
    } else {
        println!("  ⚠️  No config file — using defaults (run `listkeeper onboard`)");
    }

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the configuration before running other checks.");
            return Ok(());
        }
    };

    if let Ok(token) = config.require_bot_token() {
        println!("  ✅ Bot token configured");
        match TelegramChannel::new(TelegramConfig::from_settings(token, &config.telegram)) {
            Ok(channel) => match channel.health_check().await {
                Ok(true) => println!("  ✅ Telegram Bot API reachable"),
                Ok(false) => {
                    println!("  ⚠️  Telegram answered, but the token does not belong to a bot");
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Telegram Bot API unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Telegram channel: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  No bot token — set BOT_TOKEN (terminal chat still works)");
        issues += 1;
    }

    if config.telegram.allowed_users.is_empty() {
        println!("  ⚠️  telegram.allowed_users is empty — every sender will be ignored");
        issues += 1;
    } else {
        println!("  ✅ Allowed users: {}", config.telegram.allowed_users.join(", "));
    }

    match config.target_chat_id {
        Some(id) => println!("  ✅ Target chat pinned: {id}"),
        None => println!("  ℹ️  No CHAT_ID — the target chat is learned from the first message"),
    }

    match Trigger::from_config(&config.schedule) {
        Ok(triggers) => println!("  ✅ {} triggers in {}", triggers.len(), config.timezone),
        Err(e) => {
            println!("  ❌ Schedule invalid: {e}");
            issues += 1;
        }
    }

    match config.tz() {
        Ok(tz) => match listkeeper_calendar::from_config(&config.calendar, tz) {
            Ok(calendar) if calendar.name() == "disabled" => {
                println!("  ℹ️  Calendar disabled — the morning digest will say so");
            }
            Ok(calendar) => match calendar.today_agenda(Utc::now()).await {
                Ok(_) => println!("  ✅ Calendar feed answered"),
                Err(e) => {
                    println!("  ⚠️  Calendar feed failed: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Calendar: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match SqliteStore::new(&config.db_path).await {
        Ok(store) => match store.get_setting(listkeeper_core::store::TARGET_CHAT_KEY).await {
            Ok(learned) => {
                println!("  ✅ Database ready: {}", config.db_path);
                if let Some(chat) = learned {
                    println!("  ✅ Learned target chat: {chat}");
                }
            }
            Err(e) => {
                println!("  ❌ Database query failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Cannot open database {}: {e}", config.db_path);
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
