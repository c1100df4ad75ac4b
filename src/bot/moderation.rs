// src/bot/moderation.rs - Moderation actions with permission checks and warning escalation

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use std::sync::Arc;

use crate::bot::audit::AuditLogger;
use crate::bot::duration::parse_duration;
use crate::config::ModerationSettings;
use crate::platforms::Platform;
use crate::storage::Persistence;
use crate::types::{
    parse_user_mention, AuditEntry, BannedUser, BestEffort, Capability, ChannelId, CommunityId,
    Member, MessageId, ModAction, ModerationError, ModerationResult, TargetRef, UserId,
    WarningEntry,
};

#[derive(Debug, Clone)]
pub struct TimeoutOutcome {
    pub target: Member,
    pub until: DateTime<Utc>,
    pub duration: Duration,
}

/// What happened after a warning pushed a member over the threshold
#[derive(Debug, Clone, PartialEq)]
pub enum Escalation {
    TimedOut { until: DateTime<Utc> },
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct WarnOutcome {
    pub target: Member,
    /// Cumulative warnings including this one
    pub count: usize,
    pub escalation: Option<Escalation>,
}

#[derive(Debug, Clone)]
pub struct ClearOutcome {
    pub deleted: usize,
    /// Amount after clamping
    pub requested: usize,
    pub author: Option<Member>,
}

#[derive(Debug, Clone)]
pub struct WarningList {
    pub target: Member,
    pub entries: Vec<WarningEntry>,
}

/// Executes moderation actions against a community roster.
///
/// Every action validates in the same order: the target must resolve, the
/// actor must hold the action's capability, then the action's own rules
/// apply. Each successful action is written to the audit log once.
pub struct ModerationEngine {
    persistence: Persistence,
    platform: Arc<dyn Platform>,
    audit: AuditLogger,
    settings: ModerationSettings,
}

impl ModerationEngine {
    pub fn new(
        persistence: Persistence,
        platform: Arc<dyn Platform>,
        settings: ModerationSettings,
    ) -> Self {
        let audit = AuditLogger::new(persistence.clone(), platform.clone());
        Self {
            persistence,
            platform,
            audit,
            settings,
        }
    }

    pub async fn kick(
        &self,
        community: CommunityId,
        actor: &Member,
        target: &TargetRef,
        reason: Option<&str>,
    ) -> ModerationResult<Member> {
        let target = self.resolve(community, target).await?;
        self.require(community, actor, Capability::KickMembers).await?;
        Self::check_target(actor, &target)?;

        self.platform.kick(community, target.id, reason).await?;
        info!("{} kicked {} from community {}", actor.name, target.name, community);

        self.audit(
            community,
            AuditEntry::new(ModAction::Kick, actor, Some((&target).into()), reason),
        )
        .await;
        Ok(target)
    }

    pub async fn ban(
        &self,
        community: CommunityId,
        actor: &Member,
        target: &TargetRef,
        reason: Option<&str>,
    ) -> ModerationResult<Member> {
        let target = self.resolve(community, target).await?;
        self.require(community, actor, Capability::BanMembers).await?;
        Self::check_target(actor, &target)?;

        self.platform.ban(community, target.id, reason).await?;
        info!("{} banned {} from community {}", actor.name, target.name, community);

        self.audit(
            community,
            AuditEntry::new(ModAction::Ban, actor, Some((&target).into()), reason),
        )
        .await;
        Ok(target)
    }

    /// Lift a ban. `query` is a mention, an id, or the exact account name
    /// (case-insensitive) as listed in the ban roster.
    pub async fn unban(
        &self,
        community: CommunityId,
        actor: &Member,
        query: &str,
        reason: Option<&str>,
    ) -> ModerationResult<BannedUser> {
        let query = query.trim();
        let id = parse_user_mention(query).or_else(|| query.parse().ok());

        let banned = self
            .platform
            .bans(community)
            .await?
            .into_iter()
            .find(|b| Some(b.id) == id || b.name.eq_ignore_ascii_case(query))
            .ok_or(ModerationError::TargetNotFound)?;
        self.require(community, actor, Capability::BanMembers).await?;

        self.platform.unban(community, banned.id).await?;
        info!("{} unbanned {} in community {}", actor.name, banned.name, community);

        self.audit(
            community,
            AuditEntry::new(ModAction::Unban, actor, Some((&banned).into()), reason),
        )
        .await;
        Ok(banned)
    }

    pub async fn timeout(
        &self,
        community: CommunityId,
        actor: &Member,
        target: &TargetRef,
        duration: &str,
        reason: Option<&str>,
    ) -> ModerationResult<TimeoutOutcome> {
        let target = self.resolve(community, target).await?;
        self.require(community, actor, Capability::ModerateMembers).await?;
        Self::check_target(actor, &target)?;

        let length = parse_duration(duration)?;
        let until = Utc::now()
            .checked_add_signed(length)
            .ok_or_else(|| ModerationError::InvalidDuration(duration.to_string()))?;

        self.platform.timeout(community, target.id, Some(until), reason).await?;
        info!("{} timed out {} until {}", actor.name, target.name, until);

        self.audit(
            community,
            AuditEntry::new(ModAction::Timeout, actor, Some((&target).into()), reason),
        )
        .await;
        Ok(TimeoutOutcome {
            target,
            until,
            duration: length,
        })
    }

    pub async fn remove_timeout(
        &self,
        community: CommunityId,
        actor: &Member,
        target: &TargetRef,
        reason: Option<&str>,
    ) -> ModerationResult<Member> {
        let target = self.resolve(community, target).await?;
        self.require(community, actor, Capability::ModerateMembers).await?;

        if self.platform.timed_out_until(community, target.id).await?.is_none() {
            return Err(ModerationError::NotTimedOut);
        }

        self.platform.timeout(community, target.id, None, reason).await?;
        info!("{} removed the timeout of {}", actor.name, target.name);

        self.audit(
            community,
            AuditEntry::new(ModAction::RemoveTimeout, actor, Some((&target).into()), reason),
        )
        .await;
        Ok(target)
    }

    /// Record a warning. Reaching the threshold applies the escalation
    /// timeout; if the platform refuses it the warning still stands and the
    /// refusal is reported in the outcome.
    pub async fn warn(
        &self,
        community: CommunityId,
        actor: &Member,
        target: &TargetRef,
        reason: Option<&str>,
    ) -> ModerationResult<WarnOutcome> {
        let target = self.resolve(community, target).await?;
        self.require(community, actor, Capability::KickMembers).await?;
        Self::check_target(actor, &target)?;

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(ModerationError::MissingReason)?;

        let entry = WarningEntry {
            id: uuid::Uuid::new_v4(),
            moderator_id: actor.id,
            reason: Some(reason.to_string()),
            timestamp: Utc::now(),
        };
        let count = self.persistence.append_warning(community, target.id, entry).await?;
        info!("{} warned {} ({} total): {}", actor.name, target.name, count, reason);

        let mut audit_entry =
            AuditEntry::new(ModAction::Warn, actor, Some((&target).into()), Some(reason));
        audit_entry.warning_count = Some(count);
        self.audit(community, audit_entry).await;

        let escalation = if count >= self.settings.warning_threshold {
            Some(self.escalate(community, actor, &target, count).await)
        } else {
            None
        };

        Ok(WarnOutcome {
            target,
            count,
            escalation,
        })
    }

    async fn escalate(
        &self,
        community: CommunityId,
        actor: &Member,
        target: &Member,
        count: usize,
    ) -> Escalation {
        let reason = format!("Reached {} warnings", count);
        let Some(until) = self
            .settings
            .escalation_timeout()
            .and_then(|length| Utc::now().checked_add_signed(length))
        else {
            warn!(
                "Escalation timeout of {}s for {} is out of range",
                self.settings.escalation_timeout_seconds, target.name
            );
            return Escalation::Failed {
                reason: format!(
                    "escalation timeout of {} seconds is out of range",
                    self.settings.escalation_timeout_seconds
                ),
            };
        };

        match self.platform.timeout(community, target.id, Some(until), Some(&reason)).await {
            Ok(()) => {
                info!("Escalated {} to a timeout until {}", target.name, until);
                self.audit(
                    community,
                    AuditEntry::new(ModAction::Timeout, actor, Some(target.into()), Some(&reason)),
                )
                .await;
                Escalation::TimedOut { until }
            }
            Err(e) => {
                warn!("Escalation timeout for {} failed: {}", target.name, e);
                Escalation::Failed { reason: e.to_string() }
            }
        }
    }

    /// Bulk-delete recent messages in `channel` sent before `command_message`,
    /// optionally only those of `author`. The amount is clamped silently into
    /// `1..=clear_max` and the platform's own purge limit.
    pub async fn clear(
        &self,
        community: CommunityId,
        channel: ChannelId,
        command_message: MessageId,
        actor: &Member,
        amount: i64,
        author: Option<&TargetRef>,
    ) -> ModerationResult<ClearOutcome> {
        let author = match author {
            Some(target) => Some(self.resolve(community, target).await?),
            None => None,
        };
        self.require(community, actor, Capability::ManageMessages).await?;

        let max = self.settings.clear_max.min(self.platform.max_purge()).max(1);
        let requested = usize::try_from(amount.max(1)).unwrap_or(max).min(max);

        let deleted = self
            .platform
            .purge(channel, requested, command_message, author.as_ref().map(|a| a.id))
            .await?;
        BestEffort::new(self.platform.delete_message(channel, command_message).await)
            .acknowledge("clear command deletion");
        info!("{} cleared {} messages in channel {}", actor.name, deleted, channel);

        let mut entry =
            AuditEntry::new(ModAction::Clear, actor, author.as_ref().map(Into::into), None);
        entry.message_count = Some(deleted);
        self.audit(community, entry).await;

        Ok(ClearOutcome {
            deleted,
            requested,
            author,
        })
    }

    pub async fn warnings(
        &self,
        community: CommunityId,
        actor: &Member,
        target: &TargetRef,
    ) -> ModerationResult<WarningList> {
        let target = self.resolve(community, target).await?;
        self.require(community, actor, Capability::KickMembers).await?;

        let entries = self.persistence.warnings(community, target.id).await?;
        Ok(WarningList { target, entries })
    }

    /// Members of the community with at least one warning, most warned first
    pub async fn warned_users(
        &self,
        community: CommunityId,
        actor: &Member,
    ) -> ModerationResult<Vec<(UserId, usize)>> {
        self.require(community, actor, Capability::KickMembers).await?;

        let mut users = self.persistence.warned_users(community).await?;
        users.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(users)
    }

    /// Purge a member's warnings; returns the target and how many were removed
    pub async fn clear_warnings(
        &self,
        community: CommunityId,
        actor: &Member,
        target: &TargetRef,
    ) -> ModerationResult<(Member, usize)> {
        let target = self.resolve(community, target).await?;
        self.require(community, actor, Capability::KickMembers).await?;

        let removed = self.persistence.clear_warnings(community, target.id).await?;
        info!("{} cleared {} warnings of {}", actor.name, removed, target.name);
        Ok((target, removed))
    }

    pub async fn set_log_channel(
        &self,
        community: CommunityId,
        actor: &Member,
        channel: ChannelId,
    ) -> ModerationResult<()> {
        self.require(community, actor, Capability::ManageChannels).await?;
        self.persistence.set_log_channel(community, channel).await?;
        info!("Log channel of community {} set to {}", community, channel);
        Ok(())
    }

    pub async fn remove_log_channel(
        &self,
        community: CommunityId,
        actor: &Member,
    ) -> ModerationResult<bool> {
        self.require(community, actor, Capability::ManageChannels).await?;
        Ok(self.persistence.remove_log_channel(community).await?)
    }

    async fn resolve(
        &self,
        community: CommunityId,
        target: &TargetRef,
    ) -> ModerationResult<Member> {
        let member = match target {
            TargetRef::Id(id) => self.platform.member(community, *id).await?,
            TargetRef::Text(query) => self.platform.resolve_member(community, query).await?,
        };
        member.ok_or(ModerationError::TargetNotFound)
    }

    async fn require(
        &self,
        community: CommunityId,
        actor: &Member,
        capability: Capability,
    ) -> ModerationResult<()> {
        if self.platform.has_capability(community, actor.id, capability).await? {
            Ok(())
        } else {
            info!("{} lacks {:?} in community {}", actor.name, capability, community);
            Err(ModerationError::PermissionDenied)
        }
    }

    fn check_target(actor: &Member, target: &Member) -> ModerationResult<()> {
        if target.bot {
            return Err(ModerationError::BotTarget);
        }
        if target.id == actor.id {
            return Err(ModerationError::SelfTarget);
        }
        Ok(())
    }

    async fn audit(&self, community: CommunityId, entry: AuditEntry) {
        self.audit.record(community, &entry).await.acknowledge("audit log delivery");
    }
}
