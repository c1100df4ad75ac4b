use chrono::Utc;
use futures_util::future::try_join_all;
use log::{debug, info};
use std::sync::Arc;

use crate::config::AfkSettings;
use crate::platforms::Platform;
use crate::storage::Persistence;
use crate::types::{
    AfkRecord, BestEffort, CommunityId, InboundMessage, Member, ModerationError, ModerationResult,
    UserId,
};

/// Notices produced by the AFK side effects of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AfkNotice {
    WelcomeBack { user: Member },
    IsAfk { user: Member, reason: String },
}

/// Tracks self-declared absences and mirrors them into display names
pub struct AfkTracker {
    persistence: Persistence,
    platform: Arc<dyn Platform>,
    settings: AfkSettings,
}

impl AfkTracker {
    pub fn new(
        persistence: Persistence,
        platform: Arc<dyn Platform>,
        settings: AfkSettings,
    ) -> Self {
        Self {
            persistence,
            platform,
            settings,
        }
    }

    /// Display name shown while AFK, cut to the platform limit
    pub fn afk_display_name(&self, display_name: &str) -> String {
        format!("{} {}", self.settings.name_prefix, display_name)
            .chars()
            .take(self.settings.max_display_name_length)
            .collect()
    }

    pub fn default_reason(&self) -> &str {
        &self.settings.default_reason
    }

    /// Mark `user` AFK. The record is stored even if the rename fails.
    pub async fn set_afk(
        &self,
        community: CommunityId,
        user: UserId,
        display_name: &str,
        reason: &str,
    ) -> ModerationResult<AfkRecord> {
        if self.persistence.afk(user).await?.is_some() {
            return Err(ModerationError::AlreadyAfk);
        }

        let record = AfkRecord {
            reason: reason.to_string(),
            original_display_name: display_name.to_string(),
            community_id: community,
            since: Utc::now(),
        };
        self.persistence.put_afk(user, &record).await?;

        let nickname = self.afk_display_name(display_name);
        BestEffort::new(self.platform.set_nickname(community, user, Some(&nickname)).await)
            .acknowledge("AFK rename");

        info!("User {} is now AFK: {}", user, reason);
        Ok(record)
    }

    /// Leave AFK, restoring the display name captured on entry.
    /// Returns the cleared record, or `None` if the user was not AFK.
    pub async fn clear_afk(&self, user: UserId) -> ModerationResult<Option<AfkRecord>> {
        let Some(record) = self.persistence.afk(user).await? else {
            return Ok(None);
        };

        self.persistence.delete_afk(user).await?;

        BestEffort::new(
            self.platform
                .set_nickname(record.community_id, user, Some(&record.original_display_name))
                .await,
        )
        .acknowledge("AFK name restore");

        info!("User {} is back from AFK", user);
        Ok(Some(record))
    }

    pub async fn check_afk(&self, user: UserId) -> ModerationResult<Option<String>> {
        Ok(self.persistence.afk(user).await?.map(|record| record.reason))
    }

    /// AFK side effects of an inbound message: the author comes back (unless
    /// `exempt_author`), and every other mentioned AFK user is announced.
    pub async fn on_message(
        &self,
        message: &InboundMessage,
        exempt_author: bool,
    ) -> ModerationResult<Vec<AfkNotice>> {
        if message.author.bot {
            return Ok(Vec::new());
        }

        let mut notices = Vec::new();

        if !exempt_author && self.clear_afk(message.author.id).await?.is_some() {
            notices.push(AfkNotice::WelcomeBack {
                user: message.author.clone(),
            });
        }

        let mut mentioned: Vec<&Member> = Vec::new();
        for member in &message.mentions {
            if member.id != message.author.id && !mentioned.iter().any(|m| m.id == member.id) {
                mentioned.push(member);
            }
        }

        let lookups = mentioned.iter().map(|member| self.persistence.afk(member.id));
        let reasons = try_join_all(lookups).await?;
        for (member, record) in mentioned.into_iter().zip(reasons) {
            if let Some(record) = record {
                debug!("Mentioned user {} is AFK", member.id);
                notices.push(AfkNotice::IsAfk {
                    user: member.clone(),
                    reason: record.reason,
                });
            }
        }

        Ok(notices)
    }
}
