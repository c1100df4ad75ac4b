use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::platforms::{Platform, PlatformResult, DEFAULT_MAX_PURGE};
use crate::types::{
    parse_user_mention, AuditEntry, BannedUser, Capability, ChannelId, CommunityId, InboundMessage,
    Member, MessageId, PlatformError, UserId,
};

/// Longest suspension the platform accepts
const MAX_TIMEOUT_DAYS: i64 = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub author: UserId,
    pub content: String,
}

#[derive(Default)]
struct CommunityState {
    members: HashMap<UserId, Member>,
    capabilities: HashMap<UserId, HashSet<Capability>>,
    /// Members ranked above the bot; moderation against them is refused
    protected: HashSet<UserId>,
    bans: BTreeMap<UserId, BannedUser>,
    timeouts: HashMap<UserId, DateTime<Utc>>,
}

struct ChannelState {
    community: CommunityId,
    messages: Vec<StoredMessage>,
}

#[derive(Default)]
struct MemoryState {
    communities: HashMap<CommunityId, CommunityState>,
    channels: HashMap<ChannelId, ChannelState>,
    next_message_id: MessageId,
    fail_nickname_changes: bool,
    audit_log: Vec<(ChannelId, AuditEntry)>,
}

impl MemoryState {
    fn community(&self, community: CommunityId) -> PlatformResult<&CommunityState> {
        self.communities
            .get(&community)
            .ok_or_else(|| PlatformError::NotFound(format!("community {}", community)))
    }

    fn community_mut(&mut self, community: CommunityId) -> PlatformResult<&mut CommunityState> {
        self.communities
            .get_mut(&community)
            .ok_or_else(|| PlatformError::NotFound(format!("community {}", community)))
    }

    fn channel_mut(&mut self, channel: ChannelId) -> PlatformResult<&mut ChannelState> {
        self.channels
            .get_mut(&channel)
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel)))
    }

    fn next_id(&mut self) -> MessageId {
        self.next_message_id += 1;
        self.next_message_id
    }
}

impl CommunityState {
    fn moderatable(&self, user: UserId) -> PlatformResult<&Member> {
        let member = self
            .members
            .get(&user)
            .ok_or_else(|| PlatformError::NotFound(format!("member {}", user)))?;
        if self.protected.contains(&user) {
            return Err(PlatformError::Rejected(
                "target's highest role is above the bot's".to_string(),
            ));
        }
        Ok(member)
    }
}

/// Self-contained platform that keeps rosters, channels and moderation
/// state in memory. Used by the local binary and throughout the tests.
pub struct MemoryPlatform {
    bot: Member,
    state: Arc<RwLock<MemoryState>>,
    message_sender: broadcast::Sender<InboundMessage>,
    max_purge: usize,
}

impl MemoryPlatform {
    pub fn new(bot: Member) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            bot,
            state: Arc::new(RwLock::new(MemoryState::default())),
            message_sender: tx,
            max_purge: DEFAULT_MAX_PURGE,
        }
    }

    pub fn with_max_purge(mut self, max_purge: usize) -> Self {
        self.max_purge = max_purge;
        self
    }

    pub async fn add_member(&self, community: CommunityId, member: Member) {
        let mut state = self.state.write().await;
        state
            .communities
            .entry(community)
            .or_default()
            .members
            .insert(member.id, member);
    }

    pub async fn grant(&self, community: CommunityId, user: UserId, capabilities: &[Capability]) {
        let mut state = self.state.write().await;
        state
            .communities
            .entry(community)
            .or_default()
            .capabilities
            .entry(user)
            .or_default()
            .extend(capabilities.iter().copied());
    }

    pub async fn protect(&self, community: CommunityId, user: UserId) {
        let mut state = self.state.write().await;
        state.communities.entry(community).or_default().protected.insert(user);
    }

    pub async fn add_channel(&self, community: CommunityId, channel: ChannelId) {
        let mut state = self.state.write().await;
        state.communities.entry(community).or_default();
        state.channels.insert(
            channel,
            ChannelState {
                community,
                messages: Vec::new(),
            },
        );
    }

    pub async fn remove_channel(&self, channel: ChannelId) {
        self.state.write().await.channels.remove(&channel);
    }

    pub async fn set_fail_nickname_changes(&self, fail: bool) {
        self.state.write().await.fail_nickname_changes = fail;
    }

    /// Record a message from `author` and broadcast it to the receivers
    pub async fn post(
        &self,
        channel: ChannelId,
        author: UserId,
        content: &str,
    ) -> PlatformResult<InboundMessage> {
        let message = {
            let mut state = self.state.write().await;
            let community = state
                .channels
                .get(&channel)
                .map(|c| c.community)
                .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel)))?;

            let members = &state.community(community)?.members;
            let author_member = members
                .get(&author)
                .cloned()
                .ok_or_else(|| PlatformError::NotFound(format!("member {}", author)))?;

            let mut mentions: Vec<Member> = Vec::new();
            for word in content.split_whitespace() {
                if let Some(member) = parse_user_mention(word).and_then(|id| members.get(&id)) {
                    if !mentions.iter().any(|m| m.id == member.id) {
                        mentions.push(member.clone());
                    }
                }
            }

            let id = state.next_id();
            state.channel_mut(channel)?.messages.push(StoredMessage {
                id,
                author,
                content: content.to_string(),
            });

            InboundMessage {
                id,
                community_id: community,
                channel_id: channel,
                author: author_member,
                content: content.to_string(),
                mentions,
                timestamp: Utc::now(),
            }
        };

        // No subscribers is fine for tests that call the bot directly
        let _ = self.message_sender.send(message.clone());
        Ok(message)
    }

    pub async fn messages(&self, channel: ChannelId) -> Vec<StoredMessage> {
        self.state
            .read()
            .await
            .channels
            .get(&channel)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub async fn audit_entries(&self) -> Vec<(ChannelId, AuditEntry)> {
        self.state.read().await.audit_log.clone()
    }

    pub async fn display_name(&self, community: CommunityId, user: UserId) -> Option<String> {
        let state = self.state.read().await;
        state
            .communities
            .get(&community)
            .and_then(|c| c.members.get(&user))
            .map(|m| m.display_name.clone())
    }

    pub async fn is_member(&self, community: CommunityId, user: UserId) -> bool {
        let state = self.state.read().await;
        state
            .communities
            .get(&community)
            .is_some_and(|c| c.members.contains_key(&user))
    }

    pub async fn is_banned(&self, community: CommunityId, user: UserId) -> bool {
        let state = self.state.read().await;
        state
            .communities
            .get(&community)
            .is_some_and(|c| c.bans.contains_key(&user))
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    fn platform_name(&self) -> &str {
        "memory"
    }

    fn bot_user(&self) -> &Member {
        &self.bot
    }

    async fn member(&self, community: CommunityId, user: UserId) -> PlatformResult<Option<Member>> {
        let state = self.state.read().await;
        Ok(state.community(community)?.members.get(&user).cloned())
    }

    async fn resolve_member(
        &self,
        community: CommunityId,
        query: &str,
    ) -> PlatformResult<Option<Member>> {
        let query = query.trim();
        let state = self.state.read().await;
        let members = &state.community(community)?.members;

        if let Some(id) = parse_user_mention(query).or_else(|| query.parse::<UserId>().ok()) {
            return Ok(members.get(&id).cloned());
        }

        let by_name = members.values().find(|m| m.name.eq_ignore_ascii_case(query));
        let by_display = || members.values().find(|m| m.display_name.eq_ignore_ascii_case(query));
        Ok(by_name.or_else(by_display).cloned())
    }

    async fn has_capability(
        &self,
        community: CommunityId,
        user: UserId,
        capability: Capability,
    ) -> PlatformResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .community(community)?
            .capabilities
            .get(&user)
            .is_some_and(|caps| caps.contains(&capability)))
    }

    async fn kick(
        &self,
        community: CommunityId,
        user: UserId,
        reason: Option<&str>,
    ) -> PlatformResult<()> {
        let mut state = self.state.write().await;
        let community_state = state.community_mut(community)?;
        community_state.moderatable(user)?;
        community_state.members.remove(&user);
        community_state.timeouts.remove(&user);
        info!("Kicked {} from community {} (reason: {:?})", user, community, reason);
        Ok(())
    }

    async fn ban(
        &self,
        community: CommunityId,
        user: UserId,
        reason: Option<&str>,
    ) -> PlatformResult<()> {
        let mut state = self.state.write().await;
        let community_state = state.community_mut(community)?;
        let name = community_state.moderatable(user)?.name.clone();
        community_state.members.remove(&user);
        community_state.timeouts.remove(&user);
        community_state.bans.insert(
            user,
            BannedUser {
                id: user,
                name,
                reason: reason.map(str::to_string),
            },
        );
        info!("Banned {} from community {} (reason: {:?})", user, community, reason);
        Ok(())
    }

    async fn bans(&self, community: CommunityId) -> PlatformResult<Vec<BannedUser>> {
        let state = self.state.read().await;
        Ok(state.community(community)?.bans.values().cloned().collect())
    }

    async fn unban(&self, community: CommunityId, user: UserId) -> PlatformResult<()> {
        let mut state = self.state.write().await;
        state
            .community_mut(community)?
            .bans
            .remove(&user)
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound(format!("ban for {}", user)))
    }

    async fn timeout(
        &self,
        community: CommunityId,
        user: UserId,
        until: Option<DateTime<Utc>>,
        reason: Option<&str>,
    ) -> PlatformResult<()> {
        let mut state = self.state.write().await;
        let community_state = state.community_mut(community)?;
        community_state.moderatable(user)?;

        match until {
            Some(until) => {
                if until - Utc::now() > Duration::days(MAX_TIMEOUT_DAYS) {
                    return Err(PlatformError::Rejected(format!(
                        "timeouts cannot exceed {} days",
                        MAX_TIMEOUT_DAYS
                    )));
                }
                community_state.timeouts.insert(user, until);
                info!(
                    "Timed out {} in community {} until {} (reason: {:?})",
                    user, community, until, reason
                );
            }
            None => {
                community_state.timeouts.remove(&user);
                info!("Removed timeout of {} in community {}", user, community);
            }
        }
        Ok(())
    }

    async fn timed_out_until(
        &self,
        community: CommunityId,
        user: UserId,
    ) -> PlatformResult<Option<DateTime<Utc>>> {
        let state = self.state.read().await;
        let now = Utc::now();
        Ok(state
            .community(community)?
            .timeouts
            .get(&user)
            .copied()
            .filter(|until| *until > now))
    }

    async fn set_nickname(
        &self,
        community: CommunityId,
        user: UserId,
        nickname: Option<&str>,
    ) -> PlatformResult<()> {
        let mut state = self.state.write().await;
        if state.fail_nickname_changes {
            return Err(PlatformError::Rejected(
                "missing permission to manage nicknames".to_string(),
            ));
        }
        let member = state
            .community_mut(community)?
            .members
            .get_mut(&user)
            .ok_or_else(|| PlatformError::NotFound(format!("member {}", user)))?;
        member.display_name = nickname.map(str::to_string).unwrap_or_else(|| member.name.clone());
        debug!("Display name of {} is now '{}'", user, member.display_name);
        Ok(())
    }

    async fn purge(
        &self,
        channel: ChannelId,
        limit: usize,
        before: MessageId,
        author: Option<UserId>,
    ) -> PlatformResult<usize> {
        let limit = limit.min(self.max_purge);
        let mut state = self.state.write().await;
        let channel_state = state.channel_mut(channel)?;

        let doomed: HashSet<MessageId> = channel_state
            .messages
            .iter()
            .rev()
            .filter(|m| m.id < before && author.map_or(true, |a| m.author == a))
            .take(limit)
            .map(|m| m.id)
            .collect();

        channel_state.messages.retain(|m| !doomed.contains(&m.id));
        Ok(doomed.len())
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()> {
        let mut state = self.state.write().await;
        let channel_state = state.channel_mut(channel)?;
        let before = channel_state.messages.len();
        channel_state.messages.retain(|m| m.id != message);
        if channel_state.messages.len() == before {
            return Err(PlatformError::NotFound(format!("message {}", message)));
        }
        Ok(())
    }

    async fn send_message(&self, channel: ChannelId, text: &str) -> PlatformResult<MessageId> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let bot_id = self.bot.id;
        state.channel_mut(channel)?.messages.push(StoredMessage {
            id,
            author: bot_id,
            content: text.to_string(),
        });
        info!("[#{}] {}", channel, text);
        Ok(id)
    }

    async fn send_audit(&self, channel: ChannelId, entry: &AuditEntry) -> PlatformResult<()> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let bot_id = self.bot.id;
        state.channel_mut(channel)?.messages.push(StoredMessage {
            id,
            author: bot_id,
            content: entry.to_string(),
        });
        state.audit_log.push((channel, entry.clone()));
        Ok(())
    }

    fn get_message_receiver(&self) -> Option<broadcast::Receiver<InboundMessage>> {
        Some(self.message_sender.subscribe())
    }

    fn max_purge(&self) -> usize {
        self.max_purge
    }
}
