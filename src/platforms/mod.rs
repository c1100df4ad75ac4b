use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::types::{
    AuditEntry, BannedUser, Capability, ChannelId, CommunityId, InboundMessage, Member, MessageId,
    PlatformError, UserId,
};

pub mod memory;

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Largest bulk-delete most chat platforms accept in one request
pub const DEFAULT_MAX_PURGE: usize = 100;

/// Interface every chat platform binding must implement.
///
/// Permission resolution, role hierarchy and rate limiting are the
/// platform's business; a refusal surfaces as `PlatformError::Rejected`.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Get the platform identifier (e.g. "discord", "memory")
    fn platform_name(&self) -> &str;

    /// The bot's own account
    fn bot_user(&self) -> &Member;

    async fn member(&self, community: CommunityId, user: UserId) -> PlatformResult<Option<Member>>;

    /// Resolve free text (mention, id, account name or display name) to a member
    async fn resolve_member(
        &self,
        community: CommunityId,
        query: &str,
    ) -> PlatformResult<Option<Member>>;

    async fn has_capability(
        &self,
        community: CommunityId,
        user: UserId,
        capability: Capability,
    ) -> PlatformResult<bool>;

    async fn kick(
        &self,
        community: CommunityId,
        user: UserId,
        reason: Option<&str>,
    ) -> PlatformResult<()>;

    async fn ban(
        &self,
        community: CommunityId,
        user: UserId,
        reason: Option<&str>,
    ) -> PlatformResult<()>;

    async fn bans(&self, community: CommunityId) -> PlatformResult<Vec<BannedUser>>;

    async fn unban(&self, community: CommunityId, user: UserId) -> PlatformResult<()>;

    /// Suspend (`Some(until)`) or restore (`None`) a member's ability to speak
    async fn timeout(
        &self,
        community: CommunityId,
        user: UserId,
        until: Option<DateTime<Utc>>,
        reason: Option<&str>,
    ) -> PlatformResult<()>;

    /// End of the member's current suspension, if any
    async fn timed_out_until(
        &self,
        community: CommunityId,
        user: UserId,
    ) -> PlatformResult<Option<DateTime<Utc>>>;

    /// Change (`Some`) or reset (`None`) a member's community nickname
    async fn set_nickname(
        &self,
        community: CommunityId,
        user: UserId,
        nickname: Option<&str>,
    ) -> PlatformResult<()>;

    /// Delete up to `limit` of the most recent messages sent before `before`,
    /// optionally only those written by `author`. Returns how many were deleted.
    async fn purge(
        &self,
        channel: ChannelId,
        limit: usize,
        before: MessageId,
        author: Option<UserId>,
    ) -> PlatformResult<usize>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()>;

    async fn send_message(&self, channel: ChannelId, text: &str) -> PlatformResult<MessageId>;

    /// Deliver a moderation record to a log channel
    async fn send_audit(&self, channel: ChannelId, entry: &AuditEntry) -> PlatformResult<()>;

    /// Get a receiver for incoming messages
    fn get_message_receiver(&self) -> Option<broadcast::Receiver<InboundMessage>>;

    /// Upper bound the platform places on one purge
    fn max_purge(&self) -> usize {
        DEFAULT_MAX_PURGE
    }
}
