// src/types/mod.rs - Shared identifiers, records and outcome types

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

pub mod errors;

pub use errors::{
    AuditError, BestEffort, ModerationError, ModerationResult, PlatformError, StoreError,
};

pub type UserId = u64;
pub type CommunityId = u64;
pub type ChannelId = u64;
pub type MessageId = u64;

fn user_mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<@!?(\d+)>$").expect("valid user mention regex"))
}

fn channel_mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<#(\d+)>$").expect("valid channel mention regex"))
}

/// Parse `<@123>` or `<@!123>` into a user id
pub fn parse_user_mention(text: &str) -> Option<UserId> {
    user_mention_regex()
        .captures(text.trim())
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse `<#123>` or a bare id into a channel id
pub fn parse_channel_ref(text: &str) -> Option<ChannelId> {
    let text = text.trim();
    channel_mention_regex()
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
        .or_else(|| text.parse().ok())
}

/// A member of a community as seen by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    /// Account name, unique on the platform (e.g. "alice" or "alice#0420")
    pub name: String,
    /// Name currently shown in the community (nickname or account name)
    pub display_name: String,
    pub bot: bool,
}

impl Member {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            display_name: name.clone(),
            name,
            bot: false,
        }
    }

    pub fn bot(id: UserId, name: impl Into<String>) -> Self {
        Self {
            bot: true,
            ..Self::new(id, name)
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Inbound chat message flowing through the bot pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: MessageId,
    pub community_id: CommunityId,
    pub channel_id: ChannelId,
    pub author: Member,
    pub content: String,
    pub mentions: Vec<Member>,
    pub timestamp: DateTime<Utc>,
}

/// Platform capabilities an actor must hold for a moderation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    KickMembers,
    BanMembers,
    ModerateMembers,
    ManageMessages,
    ManageChannels,
}

/// Target as supplied by the dispatcher: already resolved, or raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Id(UserId),
    Text(String),
}

impl From<&Member> for TargetRef {
    fn from(member: &Member) -> Self {
        TargetRef::Id(member.id)
    }
}

/// Entry of a community's ban roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannedUser {
    pub id: UserId,
    pub name: String,
    pub reason: Option<String>,
}

/// Persisted AFK state; present iff the user is AFK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfkRecord {
    pub reason: String,
    pub original_display_name: String,
    pub community_id: CommunityId,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningEntry {
    pub id: uuid::Uuid,
    pub moderator_id: UserId,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Votes for one content item, one score per rater
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingTally {
    pub votes: BTreeMap<UserId, u8>,
}

impl RatingTally {
    pub fn summary(&self) -> RatingSummary {
        let vote_count = self.votes.len();
        let average = if vote_count == 0 {
            0.0
        } else {
            let total: u32 = self.votes.values().map(|&s| u32::from(s)).sum();
            (f64::from(total) / vote_count as f64 * 10.0).round() / 10.0
        };

        RatingSummary {
            average,
            vote_count,
            breakdown: self.votes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    pub vote_count: usize,
    pub breakdown: BTreeMap<UserId, u8>,
}

/// Moderation action kinds recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModAction {
    Kick,
    Ban,
    Unban,
    Timeout,
    RemoveTimeout,
    Warn,
    Clear,
}

impl fmt::Display for ModAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModAction::Kick => "Kick",
            ModAction::Ban => "Ban",
            ModAction::Unban => "Unban",
            ModAction::Timeout => "Timeout",
            ModAction::RemoveTimeout => "Timeout Removed",
            ModAction::Warn => "Warn",
            ModAction::Clear => "Clear",
        };
        f.write_str(label)
    }
}

/// Identity shown in an audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSubject {
    pub id: UserId,
    pub name: String,
}

impl From<&Member> for AuditSubject {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
        }
    }
}

impl From<&BannedUser> for AuditSubject {
    fn from(user: &BannedUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}

pub const DEFAULT_AUDIT_REASON: &str = "No reason provided";

/// Structured record of one moderation action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: ModAction,
    pub moderator: AuditSubject,
    pub target: Option<AuditSubject>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    /// Cumulative warnings of the target, set for `Warn` only
    pub warning_count: Option<usize>,
    /// Messages removed, set for `Clear` only
    pub message_count: Option<usize>,
}

impl AuditEntry {
    pub fn new(
        action: ModAction,
        moderator: &Member,
        target: Option<AuditSubject>,
        reason: Option<&str>,
    ) -> Self {
        Self {
            action,
            moderator: moderator.into(),
            target,
            reason: reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or(DEFAULT_AUDIT_REASON)
                .to_string(),
            timestamp: Utc::now(),
            warning_count: None,
            message_count: None,
        }
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => writeln!(f, "{} | {}", self.action, target.name)?,
            None => writeln!(f, "{}", self.action)?,
        }
        if let Some(target) = &self.target {
            writeln!(f, "User: <@{}>", target.id)?;
        }
        writeln!(f, "Reason: {}", self.reason)?;
        writeln!(f, "Moderator: <@{}>", self.moderator.id)?;
        if let Some(count) = self.warning_count {
            writeln!(f, "Total warnings: {}", count)?;
        }
        if let Some(count) = self.message_count {
            writeln!(f, "Messages deleted: {}", count)?;
        }
        write!(f, "{}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_parsing() {
        assert_eq!(parse_user_mention("<@42>"), Some(42));
        assert_eq!(parse_user_mention("<@!42>"), Some(42));
        assert_eq!(parse_user_mention("@42"), None);
        assert_eq!(parse_user_mention("<#42>"), None);

        assert_eq!(parse_channel_ref("<#77>"), Some(77));
        assert_eq!(parse_channel_ref("77"), Some(77));
        assert_eq!(parse_channel_ref("#general"), None);
    }

    #[test]
    fn test_rating_summary_rounds_to_one_decimal() {
        let mut tally = RatingTally::default();
        tally.votes.insert(1, 5);
        tally.votes.insert(2, 4);
        tally.votes.insert(3, 4);

        let summary = tally.summary();
        assert_eq!(summary.vote_count, 3);
        assert_eq!(summary.average, 4.3);
    }

    #[test]
    fn test_empty_tally_reports_zero_votes() {
        let summary = RatingTally::default().summary();
        assert_eq!(summary.vote_count, 0);
        assert_eq!(summary.average, 0.0);
        assert!(summary.breakdown.is_empty());
    }

    #[test]
    fn test_audit_entry_defaults_reason() {
        let moderator = Member::new(1, "mod");
        let entry = AuditEntry::new(ModAction::Kick, &moderator, None, None);
        assert_eq!(entry.reason, DEFAULT_AUDIT_REASON);

        let entry = AuditEntry::new(ModAction::Kick, &moderator, None, Some("   "));
        assert_eq!(entry.reason, DEFAULT_AUDIT_REASON);
    }

    #[test]
    fn test_audit_entry_display_includes_warning_count() {
        let moderator = Member::new(1, "mod");
        let target = Member::new(2, "spammer");
        let mut entry =
            AuditEntry::new(ModAction::Warn, &moderator, Some((&target).into()), Some("spam"));
        entry.warning_count = Some(2);

        let rendered = entry.to_string();
        assert!(rendered.starts_with("Warn | spammer"));
        assert!(rendered.contains("Reason: spam"));
        assert!(rendered.contains("Total warnings: 2"));
    }
}
