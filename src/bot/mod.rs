use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{BotConfiguration, StorageBackend, StorageSettings};
use crate::platforms::Platform;
use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore, Persistence};
use crate::types::InboundMessage;

pub mod afk;
pub mod audit;
pub mod commands;
pub mod duration;
pub mod moderation;
pub mod notices;
pub mod ratings;

use afk::{AfkNotice, AfkTracker};
use commands::{welcome_back, CommandDispatcher};
use moderation::ModerationEngine;
use notices::{NoticeSender, Reply};
use ratings::RatingTracker;

/// Core bot engine: runs the AFK side effects and commands of every
/// inbound message and sends the replies
pub struct Warden {
    config: BotConfiguration,
    platform: Arc<dyn Platform>,
    persistence: Persistence,
    afk: Arc<AfkTracker>,
    dispatcher: CommandDispatcher,
    notices: NoticeSender,
}

impl Warden {
    pub fn new(
        config: BotConfiguration,
        platform: Arc<dyn Platform>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let persistence = Persistence::new(store);
        let afk = Arc::new(AfkTracker::new(
            persistence.clone(),
            platform.clone(),
            config.afk.clone(),
        ));
        let moderation = Arc::new(ModerationEngine::new(
            persistence.clone(),
            platform.clone(),
            config.moderation.clone(),
        ));
        let ratings = Arc::new(RatingTracker::new(persistence.clone()));

        let dispatcher = CommandDispatcher::new(
            config.core.command_prefix.clone(),
            config.core.bot_name.clone(),
            afk.clone(),
            moderation,
            ratings,
            config.notices.clone(),
        );

        Self {
            notices: NoticeSender::new(platform.clone()),
            config,
            platform,
            persistence,
            afk,
            dispatcher,
        }
    }

    /// Open the store selected by the storage settings
    pub async fn open_store(settings: &StorageSettings) -> Result<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match settings.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::JsonFile => Arc::new(
                JsonFileStore::open(&settings.path)
                    .await
                    .with_context(|| {
                        format!("Failed to open store at {}", settings.path.display())
                    })?,
            ),
        };
        info!("Using {} storage backend", store.backend_name());
        Ok(store)
    }

    pub fn config(&self) -> &BotConfiguration {
        &self.config
    }

    pub fn storage_backend(&self) -> &str {
        self.persistence.backend_name()
    }

    /// Process one inbound message and send the resulting replies.
    /// Returns the replies in the order they were sent.
    pub async fn handle_message(&self, message: &InboundMessage) -> Vec<Reply> {
        if message.author.bot {
            return Vec::new();
        }

        let mut replies = Vec::new();

        let exempt = self.dispatcher.is_afk_command(&message.content);
        match self.afk.on_message(message, exempt).await {
            Ok(afk_notices) => {
                replies.extend(afk_notices.into_iter().map(|notice| self.render_notice(notice)))
            }
            Err(e) => warn!("AFK processing failed for message {}: {}", message.id, e),
        }

        if let Some(reply) = self.dispatcher.dispatch(message).await {
            replies.push(reply);
        }

        for reply in &replies {
            if let Err(e) = self.notices.send(message.channel_id, reply).await {
                error!("Failed to send reply to channel {}: {}", message.channel_id, e);
            }
        }
        replies
    }

    fn render_notice(&self, notice: AfkNotice) -> Reply {
        let text = match notice {
            AfkNotice::WelcomeBack { user } => welcome_back(&user.mention()),
            AfkNotice::IsAfk { user, reason } => {
                format!("{} is currently AFK. Reason: {}", user.mention(), reason)
            }
        };
        Reply::ephemeral(text, self.config.notices.ephemeral())
    }

    /// Spawn the message processor on the platform's message stream.
    /// Each message is handled in its own task.
    pub fn start(self: Arc<Self>) -> Result<JoinHandle<()>> {
        let mut receiver = self
            .platform
            .get_message_receiver()
            .with_context(|| {
                format!("Platform {} provides no message stream", self.platform.platform_name())
            })?;

        info!(
            "{} listening on {} with prefix '{}'",
            self.config.core.bot_name,
            self.platform.platform_name(),
            self.config.core.command_prefix
        );

        Ok(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        let bot = Arc::clone(&self);
                        tokio::spawn(async move {
                            bot.handle_message(&message).await;
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Message receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Message receiver closed");
                        break;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::MemoryPlatform;
    use crate::types::{Capability, Member};
    use std::time::Duration;
    use tempfile::tempdir;

    const COMMUNITY: u64 = 10;
    const CHANNEL: u64 = 100;

    async fn setup() -> (Arc<Warden>, Arc<MemoryPlatform>) {
        let platform = Arc::new(MemoryPlatform::new(Member::bot(1, "warden")));
        platform.add_channel(COMMUNITY, CHANNEL).await;
        platform.add_member(COMMUNITY, Member::bot(1, "warden")).await;
        platform.add_member(COMMUNITY, Member::new(2, "mod")).await;
        platform.add_member(COMMUNITY, Member::new(3, "alice").with_display_name("Alice")).await;
        platform.grant(COMMUNITY, 2, &[Capability::KickMembers]).await;

        let mut config = BotConfiguration::default();
        config.storage.backend = StorageBackend::Memory;
        let store = Warden::open_store(&config.storage).await.unwrap();
        (Arc::new(Warden::new(config, platform.clone(), store)), platform)
    }

    #[test_log::test(tokio::test)]
    async fn test_afk_round_trip_through_pipeline() {
        let (bot, platform) = setup().await;

        let message = platform.post(CHANNEL, 3, "69 afk lunch").await.unwrap();
        let replies = bot.handle_message(&message).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "<@3> is now AFK. Reason: lunch");

        let message = platform.post(CHANNEL, 2, "hey <@3>").await.unwrap();
        let replies = bot.handle_message(&message).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "<@3> is currently AFK. Reason: lunch");

        let message = platform.post(CHANNEL, 3, "I'm back").await.unwrap();
        let replies = bot.handle_message(&message).await;
        assert_eq!(replies[0].text, "Welcome back, <@3>! Your AFK status has been removed.");
        assert_eq!(platform.display_name(COMMUNITY, 3).await.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_afk_command_while_afk_toggles_off_once() {
        let (bot, platform) = setup().await;

        let message = platform.post(CHANNEL, 3, "69 afk").await.unwrap();
        bot.handle_message(&message).await;

        let message = platform.post(CHANNEL, 3, "69 afk").await.unwrap();
        let replies = bot.handle_message(&message).await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].text.starts_with("Welcome back"));
    }

    #[tokio::test]
    async fn test_bot_messages_are_skipped() {
        let (bot, platform) = setup().await;

        let message = platform.post(CHANNEL, 1, "69 help").await.unwrap();
        assert!(bot.handle_message(&message).await.is_empty());
    }

    #[tokio::test]
    async fn test_replies_are_sent_to_channel() {
        let (bot, platform) = setup().await;

        let message = platform.post(CHANNEL, 2, "69 kick alice rude").await.unwrap();
        bot.handle_message(&message).await;

        let messages = platform.messages(CHANNEL).await;
        let last = messages.last().unwrap();
        assert_eq!(last.author, 1);
        assert!(last.content.starts_with("User Kicked"));
    }

    #[tokio::test]
    async fn test_started_bot_processes_posted_messages() {
        let (bot, platform) = setup().await;
        let handle = bot.clone().start().unwrap();

        platform.post(CHANNEL, 3, "69 rate logo 5").await.unwrap();

        let mut replied = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if platform.messages(CHANNEL).await.iter().any(|m| m.author == 1) {
                replied = true;
                break;
            }
        }
        assert!(replied);
        handle.abort();
    }

    #[tokio::test]
    async fn test_json_store_selected_from_settings() {
        let temp_dir = tempdir().unwrap();
        let settings = StorageSettings {
            backend: StorageBackend::JsonFile,
            path: temp_dir.path().join("data").join("warden.json"),
        };

        let store = Warden::open_store(&settings).await.unwrap();
        assert_eq!(store.backend_name(), "json_file");
    }
}
