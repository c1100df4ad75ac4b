// src/bot/notices.rs - Outgoing replies, optionally removed after a delay

use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::platforms::{Platform, PlatformResult};
use crate::types::{BestEffort, ChannelId, MessageId};

/// Rendered reply. `lifetime: None` keeps the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub lifetime: Option<Duration>,
}

impl Reply {
    pub fn permanent(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lifetime: None,
        }
    }

    pub fn ephemeral(text: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            text: text.into(),
            lifetime: Some(lifetime),
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.lifetime.is_some()
    }
}

pub struct NoticeSender {
    platform: Arc<dyn Platform>,
}

impl NoticeSender {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Send `reply`; ephemeral replies get a detached task that deletes them
    /// once their lifetime has passed.
    pub async fn send(
        &self,
        channel: ChannelId,
        reply: &Reply,
    ) -> PlatformResult<(MessageId, Option<JoinHandle<()>>)> {
        let message = self.platform.send_message(channel, &reply.text).await?;

        let cleanup = reply.lifetime.map(|lifetime| {
            Self::schedule_delete(self.platform.clone(), channel, message, lifetime)
        });
        Ok((message, cleanup))
    }

    fn schedule_delete(
        platform: Arc<dyn Platform>,
        channel: ChannelId,
        message: MessageId,
        lifetime: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            let deleted = BestEffort::new(platform.delete_message(channel, message).await);
            if deleted.acknowledge("ephemeral notice deletion").is_some() {
                debug!("Removed ephemeral notice {} in channel {}", message, channel);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::MemoryPlatform;
    use crate::types::Member;

    async fn setup() -> (NoticeSender, Arc<MemoryPlatform>) {
        let platform = Arc::new(MemoryPlatform::new(Member::bot(1, "warden")));
        platform.add_channel(10, 100).await;
        (NoticeSender::new(platform.clone()), platform)
    }

    #[tokio::test]
    async fn test_permanent_reply_stays() {
        let (sender, platform) = setup().await;

        let (_, cleanup) = sender.send(100, &Reply::permanent("Kicked troll")).await.unwrap();
        assert!(cleanup.is_none());
        assert_eq!(platform.messages(100).await.len(), 1);
    }

    #[tokio::test]
    async fn test_ephemeral_reply_is_deleted() {
        let (sender, platform) = setup().await;

        let reply = Reply::ephemeral("Welcome back", Duration::from_millis(10));
        let (_, cleanup) = sender.send(100, &reply).await.unwrap();
        assert_eq!(platform.messages(100).await.len(), 1);

        cleanup.unwrap().await.unwrap();
        assert!(platform.messages(100).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_is_swallowed() {
        let (sender, platform) = setup().await;

        let reply = Reply::ephemeral("gone soon", Duration::from_millis(10));
        let (message, cleanup) = sender.send(100, &reply).await.unwrap();
        platform.delete_message(100, message).await.unwrap();

        assert!(cleanup.unwrap().await.is_ok());
    }

    #[tokio::test]
    async fn test_send_to_missing_channel_fails() {
        let (sender, _) = setup().await;
        assert!(sender.send(404, &Reply::permanent("hello")).await.is_err());
    }
}
