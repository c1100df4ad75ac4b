use log::{debug, warn};
use std::sync::Arc;

use crate::platforms::Platform;
use crate::storage::Persistence;
use crate::types::{AuditEntry, AuditError, BestEffort, CommunityId};

/// Routes moderation records to each community's configured log channel.
/// Logging is opportunistic: no channel configured means nothing is sent.
pub struct AuditLogger {
    persistence: Persistence,
    platform: Arc<dyn Platform>,
}

impl AuditLogger {
    pub fn new(persistence: Persistence, platform: Arc<dyn Platform>) -> Self {
        Self { persistence, platform }
    }

    /// Deliver `entry`. Returns whether it was sent; `Ok(false)` when the
    /// community has no log channel.
    pub async fn record(
        &self,
        community: CommunityId,
        entry: &AuditEntry,
    ) -> BestEffort<bool, AuditError> {
        BestEffort::new(self.deliver(community, entry).await)
    }

    async fn deliver(
        &self,
        community: CommunityId,
        entry: &AuditEntry,
    ) -> Result<bool, AuditError> {
        let Some(channel) = self.persistence.log_channel(community).await? else {
            debug!("No log channel for community {}, skipping {} entry", community, entry.action);
            return Ok(false);
        };

        if let Err(e) = self.platform.send_audit(channel, entry).await {
            warn!("Failed to deliver {} entry to log channel {}: {}", entry.action, channel, e);
            return Err(e.into());
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::MemoryPlatform;
    use crate::storage::MemoryStore;
    use crate::types::{Member, ModAction};

    async fn setup() -> (AuditLogger, Arc<MemoryPlatform>, Persistence) {
        let platform = Arc::new(MemoryPlatform::new(Member::bot(1, "warden")));
        platform.add_channel(10, 500).await;
        let persistence = Persistence::new(Arc::new(MemoryStore::new()));
        let logger = AuditLogger::new(persistence.clone(), platform.clone());
        (logger, platform, persistence)
    }

    fn entry() -> AuditEntry {
        let moderator = Member::new(2, "mod");
        let target = Member::new(3, "troll");
        AuditEntry::new(ModAction::Kick, &moderator, Some((&target).into()), None)
    }

    #[tokio::test]
    async fn test_no_mapping_is_silent() {
        let (logger, platform, _) = setup().await;

        let sent = logger.record(10, &entry()).await;
        assert_eq!(sent.acknowledge("audit"), Some(false));
        assert!(platform.audit_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_entry_delivered_to_mapped_channel() {
        let (logger, platform, persistence) = setup().await;
        persistence.set_log_channel(10, 500).await.unwrap();

        assert_eq!(logger.record(10, &entry()).await.acknowledge("audit"), Some(true));

        let entries = platform.audit_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, 500);
        assert_eq!(entries[0].1.action, ModAction::Kick);
        assert_eq!(entries[0].1.reason, "No reason provided");
    }

    #[tokio::test]
    async fn test_deleted_channel_failure_is_contained() {
        let (logger, platform, persistence) = setup().await;
        persistence.set_log_channel(10, 500).await.unwrap();
        platform.remove_channel(500).await;

        let result = logger.record(10, &entry()).await;
        assert!(!result.succeeded());
        assert_eq!(result.acknowledge("audit"), None);
    }
}
