// src/main.rs - Local console runner: stdin lines become chat messages

use anyhow::{Context, Result};
use log::{error, info};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use warden::prelude::*;

const COMMUNITY: u64 = 1;
const CHANNEL: u64 = 1;
const LOG_CHANNEL: u64 = 2;
const BOT_ID: u64 = 1;
const OPERATOR_ID: u64 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting Warden v{}", warden::VERSION);

    let config_dir = env::var("WARDEN_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config_manager = ConfigurationManager::new(&config_dir);
    config_manager
        .initialize()
        .await
        .with_context(|| format!("Failed to initialize configuration in {}", config_dir))?;

    let mut config = config_manager.get_bot_config().await;
    config.apply_env_overrides();

    let store = Warden::open_store(&config.storage).await?;
    let platform = Arc::new(seed_platform(&config.core.bot_name).await);
    let prefix = config.core.command_prefix.clone();

    let bot = Arc::new(Warden::new(config, platform.clone(), store));
    let processor = bot.start()?;

    info!(
        "Type messages as the operator (<@{}>); try '{}help'. Channel <#{}> is free for logs.",
        OPERATOR_ID, prefix, LOG_CHANNEL
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => {
                        if let Err(e) = platform.post(CHANNEL, OPERATOR_ID, &line).await {
                            error!("Failed to post message: {}", e);
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C signal, shutting down...");
                break;
            }
        }
    }

    processor.abort();
    info!("Warden stopped");
    Ok(())
}

/// A single community with an all-powerful operator and a couple of members
async fn seed_platform(bot_name: &str) -> MemoryPlatform {
    let bot = Member::bot(BOT_ID, bot_name.to_lowercase());
    let platform = MemoryPlatform::new(bot.clone());

    platform.add_channel(COMMUNITY, CHANNEL).await;
    platform.add_channel(COMMUNITY, LOG_CHANNEL).await;
    platform.add_member(COMMUNITY, bot).await;
    platform.add_member(COMMUNITY, Member::new(OPERATOR_ID, "operator")).await;
    platform.add_member(COMMUNITY, Member::new(3, "alice").with_display_name("Alice")).await;
    platform.add_member(COMMUNITY, Member::new(4, "bob")).await;
    platform
        .grant(
            COMMUNITY,
            OPERATOR_ID,
            &[
                Capability::KickMembers,
                Capability::BanMembers,
                Capability::ModerateMembers,
                Capability::ManageMessages,
                Capability::ManageChannels,
            ],
        )
        .await;

    platform
}
