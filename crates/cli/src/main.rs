//! Listkeeper CLI: the main entry point.
//!
//! Commands:
//! - `run`: Start the Telegram bot with the daily scheduler
//! - `chat`: Same runtime, driven from the terminal
//! - `onboard`: Write a default config file
//! - `doctor`: Diagnose configuration and database
//! - `items`: List active items of a chat
//! - `schedule`: Show the configured triggers

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "listkeeper",
    about = "Listkeeper — personal list-management chat assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to ~/.listkeeper/config.toml)
    #[arg(short, long, global = true, env = "LISTKEEPER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Telegram bot and the daily scheduler
    Run,

    /// Talk to the assistant from this terminal
    Chat {
        /// Chat id the terminal session acts as
        #[arg(long, default_value_t = 1)]
        chat_id: i64,
    },

    /// Write a default config file
    Onboard,

    /// Diagnose configuration and database
    Doctor,

    /// List active items of a chat
    Items {
        /// Chat id to list
        #[arg(long)]
        chat_id: i64,

        /// Restrict to one topic (inbox, tasks, reminders, shopping)
        #[arg(short, long)]
        topic: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the configured triggers and when they fire next
    Schedule,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run => commands::run::run(config_path).await?,
        Commands::Chat { chat_id } => commands::chat::run(config_path, chat_id).await?,
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Items { chat_id, topic, json } => {
            commands::items::run(config_path, chat_id, topic, json).await?
        }
        Commands::Schedule => commands::schedule::run(config_path).await?,
    }

    Ok(())
}
