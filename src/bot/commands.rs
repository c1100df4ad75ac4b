// src/bot/commands.rs - Prefix command parsing and plain-text replies

use log::{debug, error, info};
use std::sync::Arc;

use crate::bot::afk::AfkTracker;
use crate::bot::duration::{format_duration, parse_duration};
use crate::bot::moderation::{Escalation, ModerationEngine};
use crate::bot::notices::Reply;
use crate::bot::ratings::RatingTracker;
use crate::config::NoticeSettings;
use crate::types::{
    parse_channel_ref, InboundMessage, ModerationError, ModerationResult, TargetRef,
    DEFAULT_AUDIT_REASON,
};

/// Help text for one command; `usage` and `example` omit the prefix
pub struct CommandInfo {
    pub name: &'static str,
    pub usage: &'static str,
    pub example: &'static str,
    pub description: &'static str,
}

pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "kick",
        usage: "kick <user> [reason]",
        example: "kick @User spamming",
        description: "Kicks a user from the server. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "ban",
        usage: "ban <user> [reason]",
        example: "ban @User breaking rules",
        description: "Bans a user from the server. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "unban",
        usage: "unban <user_id_or_name>",
        example: "unban 123456789012345678",
        description: "Unbans a user by ID or account name. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "timeout",
        usage: "timeout <user> <duration> [reason]",
        example: "timeout @User 10m spamming",
        description: "Times out a user for a duration (s, m, h, d). (Moderator/Admin only)",
    },
    CommandInfo {
        name: "removetimeout",
        usage: "removetimeout <user> [reason]",
        example: "removetimeout @User done with timeout",
        description: "Removes timeout from a user. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "warn",
        usage: "warn <user> <reason>",
        example: "warn @User inappropriate language",
        description: "Warns a user. Three warnings mean a one hour timeout. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "warns",
        usage: "warns [user]",
        example: "warns @User",
        description: "Shows the warnings of a user, or everyone warned. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "clearwarns",
        usage: "clearwarns <user>",
        example: "clearwarns @User",
        description: "Removes all warnings of a user. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "setlogschannel",
        usage: "setlogschannel <#channel>",
        example: "setlogschannel #mod-logs",
        description: "Sets the moderation logs channel. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "removelogschannel",
        usage: "removelogschannel",
        example: "removelogschannel",
        description: "Stops sending moderation logs. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "clear",
        usage: "clear <amount> [user]",
        example: "clear 50\nclear 30 @User",
        description: "Deletes recent messages, optionally only one user's. (Moderator/Admin only)",
    },
    CommandInfo {
        name: "afk",
        usage: "afk [reason]",
        example: "afk Taking a break",
        description: "Sets your AFK status with an optional reason. Use it again to come back.",
    },
    CommandInfo {
        name: "rate",
        usage: "rate <item> <1-5>",
        example: "rate new-logo 4",
        description: "Rates an item from 1 to 5. Voting again replaces your vote.",
    },
    CommandInfo {
        name: "rating",
        usage: "rating <item>",
        example: "rating new-logo",
        description: "Shows the average rating of an item.",
    },
    CommandInfo {
        name: "help",
        usage: "help [command]",
        example: "help timeout",
        description: "Shows this help message.",
    },
];

pub fn command_info(name: &str) -> Option<&'static CommandInfo> {
    COMMANDS.iter().find(|info| info.name == name)
}

/// A prefixed message split into a lowercased command name and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: String,
    pub args: Vec<&'a str>,
    /// Everything after the command name, untrimmed inside
    pub rest: &'a str,
}

impl<'a> ParsedCommand<'a> {
    /// Text after the first `skip` arguments, or `None` if empty
    fn tail(&self, skip: usize) -> Option<&'a str> {
        let mut rest = self.rest;
        for _ in 0..skip {
            rest = rest.trim_start();
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            rest = &rest[end..];
        }
        let rest = rest.trim();
        (!rest.is_empty()).then_some(rest)
    }
}

pub struct CommandDispatcher {
    prefix: String,
    bot_name: String,
    afk: Arc<AfkTracker>,
    moderation: Arc<ModerationEngine>,
    ratings: Arc<RatingTracker>,
    notices: NoticeSettings,
}

impl CommandDispatcher {
    pub fn new(
        prefix: String,
        bot_name: String,
        afk: Arc<AfkTracker>,
        moderation: Arc<ModerationEngine>,
        ratings: Arc<RatingTracker>,
        notices: NoticeSettings,
    ) -> Self {
        Self {
            prefix,
            bot_name,
            afk,
            moderation,
            ratings,
            notices,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn parse<'a>(&self, content: &'a str) -> Option<ParsedCommand<'a>> {
        let body = content.trim_start().strip_prefix(self.prefix.as_str())?;
        let body = body.trim_start();
        let end = body.find(char::is_whitespace).unwrap_or(body.len());
        let (name, rest) = body.split_at(end);
        if name.is_empty() {
            return None;
        }

        Some(ParsedCommand {
            name: name.to_lowercase(),
            args: rest.split_whitespace().collect(),
            rest,
        })
    }

    /// Whether `content` invokes the AFK command
    pub fn is_afk_command(&self, content: &str) -> bool {
        self.parse(content).is_some_and(|cmd| cmd.name == "afk")
    }

    /// Run the command in `message`, if any. Unknown commands and plain chat
    /// produce no reply.
    pub async fn dispatch(&self, message: &InboundMessage) -> Option<Reply> {
        let command = self.parse(&message.content)?;
        if command_info(&command.name).is_none() {
            debug!("Unknown command: {}", command.name);
            return None;
        }

        info!(
            "Executing command '{}' for user '{}' in #{}",
            command.name, message.author.name, message.channel_id
        );

        let reply = match self.execute(message, &command).await {
            Ok(reply) => reply,
            Err(e) => self.render_error(&command.name, &e),
        };
        Some(reply)
    }

    async fn execute(
        &self,
        message: &InboundMessage,
        command: &ParsedCommand<'_>,
    ) -> ModerationResult<Reply> {
        let community = message.community_id;
        let actor = &message.author;
        let target = command.args.first().map(|arg| TargetRef::Text(arg.to_string()));

        match (command.name.as_str(), target) {
            ("help", _) => Ok(self.help(command.args.first().copied())),

            ("afk", _) => {
                if self.afk.clear_afk(actor.id).await?.is_some() {
                    return Ok(self.ephemeral(welcome_back(&actor.mention())));
                }
                let reason = command.tail(0).unwrap_or(self.afk.default_reason());
                self.afk.set_afk(community, actor.id, &actor.display_name, reason).await?;
                Ok(self.ephemeral(format!("{} is now AFK. Reason: {}", actor.mention(), reason)))
            }

            ("kick", Some(target)) => {
                let reason = command.tail(1);
                let member = self.moderation.kick(community, actor, &target, reason).await?;
                Ok(Reply::permanent(format!(
                    "User Kicked\n{} was kicked by {}\nReason: {}",
                    member.mention(),
                    actor.mention(),
                    reason.unwrap_or(DEFAULT_AUDIT_REASON)
                )))
            }

            ("ban", Some(target)) => {
                let reason = command.tail(1);
                let member = self.moderation.ban(community, actor, &target, reason).await?;
                Ok(Reply::permanent(format!(
                    "User Banned\n{} was banned by {}\nReason: {}",
                    member.mention(),
                    actor.mention(),
                    reason.unwrap_or(DEFAULT_AUDIT_REASON)
                )))
            }

            ("unban", Some(_)) => {
                let query = command.tail(0).unwrap_or_default();
                let user = self.moderation.unban(community, actor, query, None).await?;
                Ok(Reply::permanent(format!(
                    "User Unbanned\n<@{}> was unbanned by {}",
                    user.id,
                    actor.mention()
                )))
            }

            ("timeout", Some(target)) if command.args.len() >= 2 => {
                // "10m" and "10 minutes" are both accepted
                let spaced = command
                    .args
                    .get(2)
                    .map(|unit| format!("{} {}", command.args[1], unit));
                let (duration, consumed) = match spaced {
                    Some(spaced) if parse_duration(&spaced).is_ok() => (spaced, 3),
                    _ => (command.args[1].to_string(), 2),
                };
                let reason = command.tail(consumed);
                let outcome = self
                    .moderation
                    .timeout(community, actor, &target, &duration, reason)
                    .await?;
                Ok(Reply::permanent(format!(
                    "User Timed Out\n{} was timed out by {} for {}\nReason: {}",
                    outcome.target.mention(),
                    actor.mention(),
                    format_duration(outcome.duration),
                    reason.unwrap_or(DEFAULT_AUDIT_REASON)
                )))
            }

            ("removetimeout", Some(target)) => {
                let reason = command.tail(1);
                let member = self
                    .moderation
                    .remove_timeout(community, actor, &target, reason)
                    .await?;
                Ok(Reply::permanent(format!(
                    "Timeout Removed\nTimeout removed for {} by {}\nReason: {}",
                    member.mention(),
                    actor.mention(),
                    reason.unwrap_or(DEFAULT_AUDIT_REASON)
                )))
            }

            ("warn", Some(target)) => {
                let outcome = self
                    .moderation
                    .warn(community, actor, &target, command.tail(1))
                    .await?;
                let mut text = format!(
                    "User Warned\n{} was warned by {}\nReason: {}\nTotal warnings: {}",
                    outcome.target.mention(),
                    actor.mention(),
                    command.tail(1).unwrap_or_default(),
                    outcome.count
                );
                match outcome.escalation {
                    Some(Escalation::TimedOut { until }) => text.push_str(&format!(
                        "\n{} has been timed out until {}",
                        outcome.target.mention(),
                        until.format("%Y-%m-%d %H:%M:%S UTC")
                    )),
                    Some(Escalation::Failed { reason }) => {
                        text.push_str(&format!("\nAutomatic timeout failed: {}", reason))
                    }
                    None => {}
                }
                Ok(Reply::permanent(text))
            }

            ("warns", Some(target)) => {
                let list = self.moderation.warnings(community, actor, &target).await?;
                if list.entries.is_empty() {
                    return Ok(Reply::permanent(format!(
                        "{} has no warnings.",
                        list.target.mention()
                    )));
                }

                let mut text = format!("Warnings for {}", list.target.name);
                for (i, entry) in list.entries.iter().enumerate() {
                    text.push_str(&format!(
                        "\nWarning {}: by <@{}>, {} ({})",
                        i + 1,
                        entry.moderator_id,
                        entry.reason.as_deref().unwrap_or(DEFAULT_AUDIT_REASON),
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S")
                    ));
                }
                Ok(Reply::permanent(text))
            }

            ("warns", None) => {
                let users = self.moderation.warned_users(community, actor).await?;
                if users.is_empty() {
                    return Ok(Reply::permanent("Nobody has been warned."));
                }
                let lines: Vec<String> = users
                    .iter()
                    .map(|(user, count)| format!("<@{}>: {} warning(s)", user, count))
                    .collect();
                Ok(Reply::permanent(format!("Warned members\n{}", lines.join("\n"))))
            }

            ("clearwarns", Some(target)) => {
                let (member, removed) =
                    self.moderation.clear_warnings(community, actor, &target).await?;
                Ok(Reply::permanent(format!(
                    "Removed {} warning(s) from {}",
                    removed,
                    member.mention()
                )))
            }

            ("clear", Some(_)) => {
                let Some(amount) = parse_amount(command.args[0]) else {
                    return Ok(self.usage("clear"));
                };
                let author = command.args.get(1).map(|arg| TargetRef::Text(arg.to_string()));
                let outcome = self
                    .moderation
                    .clear(
                        community,
                        message.channel_id,
                        message.id,
                        actor,
                        amount,
                        author.as_ref(),
                    )
                    .await?;
                Ok(Reply::ephemeral(
                    format!("Deleted {} message(s).", outcome.deleted),
                    self.notices.clear_report(),
                ))
            }

            ("setlogschannel", Some(_)) => {
                let Some(channel) = parse_channel_ref(command.args[0]) else {
                    return Ok(self.usage("setlogschannel"));
                };
                self.moderation.set_log_channel(community, actor, channel).await?;
                Ok(Reply::permanent(format!("Logs channel set to <#{}>", channel)))
            }

            ("removelogschannel", _) => {
                let text = if self.moderation.remove_log_channel(community, actor).await? {
                    "Logs channel removed."
                } else {
                    "No logs channel was set."
                };
                Ok(Reply::permanent(text))
            }

            ("rate", Some(_)) if command.args.len() >= 2 => {
                let item = command.args[0];
                let Ok(score) = command.args[1].parse::<i64>() else {
                    return Ok(self.usage("rate"));
                };
                let summary = self.ratings.cast_vote(item, actor.id, score).await?;
                Ok(self.ephemeral(format!(
                    "{} rated {} {}/5. Average: {:.1} from {} vote(s)",
                    actor.mention(),
                    item,
                    score,
                    summary.average,
                    summary.vote_count
                )))
            }

            ("rating", Some(_)) => {
                let item = command.args[0];
                let summary = self.ratings.summary(item).await?;
                let text = if summary.vote_count == 0 {
                    format!("{} has no ratings yet.", item)
                } else {
                    format!(
                        "{}: {:.1}/5 from {} vote(s)",
                        item, summary.average, summary.vote_count
                    )
                };
                Ok(Reply::permanent(text))
            }

            (name, _) => Ok(self.usage(name)),
        }
    }

    fn help(&self, topic: Option<&str>) -> Reply {
        if let Some(info) = topic.and_then(|t| command_info(&t.to_lowercase())) {
            return Reply::ephemeral(self.describe(info), self.notices.help());
        }

        let mut text = format!(
            "{} Commands\nPrefix: `{}`\n",
            self.bot_name,
            self.prefix.trim_end()
        );
        for info in COMMANDS {
            text.push_str(&format!("\n{}{}\n  {}", self.prefix, info.usage, info.description));
        }
        Reply::ephemeral(text, self.notices.help())
    }

    fn describe(&self, info: &CommandInfo) -> String {
        let example = info
            .example
            .lines()
            .map(|line| format!("{}{}", self.prefix, line))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Usage: {}{}\nExample: {}\n{}",
            self.prefix, info.usage, example, info.description
        )
    }

    fn usage(&self, name: &str) -> Reply {
        let text = command_info(name)
            .map(|info| self.describe(info))
            .unwrap_or_else(|| "Invalid command usage.".to_string());
        self.ephemeral(text)
    }

    fn ephemeral(&self, text: impl Into<String>) -> Reply {
        Reply::ephemeral(text, self.notices.ephemeral())
    }

    fn render_error(&self, command: &str, err: &ModerationError) -> Reply {
        match err {
            ModerationError::TargetNotFound => self.ephemeral("User not found."),
            ModerationError::PermissionDenied => {
                self.ephemeral("You don't have permission to use this command.")
            }
            ModerationError::PlatformRejected(reason) => {
                self.ephemeral(format!("I can't do that: {}", reason))
            }
            ModerationError::InvalidDuration(_) | ModerationError::MissingReason => {
                self.usage(command)
            }
            ModerationError::InvalidScore(_) => {
                self.ephemeral("Score must be a whole number from 1 to 5.")
            }
            ModerationError::AlreadyAfk => self.ephemeral("You are already AFK."),
            ModerationError::NotTimedOut => self.ephemeral("That user is not timed out."),
            ModerationError::SelfTarget => {
                self.ephemeral("You can't use this command on yourself.")
            }
            ModerationError::BotTarget => self.ephemeral("You can't use this command on a bot."),
            ModerationError::StoreUnavailable(e) => {
                error!("Command '{}' failed, storage unavailable: {}", command, e);
                self.ephemeral("Storage is temporarily unavailable, please try again.")
            }
        }
    }
}

pub fn welcome_back(mention: &str) -> String {
    format!("Welcome back, {}! Your AFK status has been removed.", mention)
}

/// Whole number, saturating when the digits overflow `i64`
fn parse_amount(arg: &str) -> Option<i64> {
    if let Ok(amount) = arg.parse::<i64>() {
        return Some(amount);
    }
    let (negative, digits) = match arg.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, arg.strip_prefix('+').unwrap_or(arg)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AfkSettings, ModerationSettings};
    use crate::platforms::memory::MemoryPlatform;
    use crate::platforms::Platform;
    use crate::storage::{MemoryStore, Persistence};
    use crate::types::{Capability, Member};

    const COMMUNITY: u64 = 10;
    const CHANNEL: u64 = 100;

    async fn setup() -> (CommandDispatcher, Arc<MemoryPlatform>, Persistence) {
        let platform = Arc::new(MemoryPlatform::new(Member::bot(1, "warden")));
        platform.add_channel(COMMUNITY, CHANNEL).await;
        platform.add_channel(COMMUNITY, 500).await;
        platform.add_member(COMMUNITY, Member::new(2, "mod").with_display_name("Mod")).await;
        platform.add_member(COMMUNITY, Member::new(3, "troll")).await;
        platform
            .grant(
                COMMUNITY,
                2,
                &[
                    Capability::KickMembers,
                    Capability::BanMembers,
                    Capability::ModerateMembers,
                    Capability::ManageMessages,
                    Capability::ManageChannels,
                ],
            )
            .await;

        let persistence = Persistence::new(Arc::new(MemoryStore::new()));
        let dyn_platform: Arc<dyn Platform> = platform.clone();
        let dispatcher = CommandDispatcher::new(
            "69 ".to_string(),
            "Warden".to_string(),
            Arc::new(AfkTracker::new(
                persistence.clone(),
                dyn_platform.clone(),
                AfkSettings::default(),
            )),
            Arc::new(ModerationEngine::new(
                persistence.clone(),
                dyn_platform,
                ModerationSettings::default(),
            )),
            Arc::new(RatingTracker::new(persistence.clone())),
            NoticeSettings::default(),
        );
        (dispatcher, platform, persistence)
    }

    async fn run(
        dispatcher: &CommandDispatcher,
        platform: &MemoryPlatform,
        author: u64,
        content: &str,
    ) -> Option<Reply> {
        let message = platform.post(CHANNEL, author, content).await.unwrap();
        dispatcher.dispatch(&message).await
    }

    #[tokio::test]
    async fn test_parse() {
        let (dispatcher, _, _) = setup().await;

        let cmd = dispatcher.parse("69 KICK <@3> being rude").unwrap();
        assert_eq!(cmd.name, "kick");
        assert_eq!(cmd.args, vec!["<@3>", "being", "rude"]);
        assert_eq!(cmd.tail(1), Some("being rude"));
        assert_eq!(cmd.tail(3), None);

        assert!(dispatcher.parse("hello there").is_none());
        assert!(dispatcher.parse("69 ").is_none());
        assert!(dispatcher.is_afk_command("69 afk lunch"));
        assert!(!dispatcher.is_afk_command("69 afkx"));
    }

    #[tokio::test]
    async fn test_plain_chat_and_unknown_commands_are_ignored() {
        let (dispatcher, platform, _) = setup().await;
        assert!(run(&dispatcher, &platform, 3, "hello").await.is_none());
        assert!(run(&dispatcher, &platform, 3, "69 dance").await.is_none());
    }

    #[tokio::test]
    async fn test_help_lists_every_command() {
        let (dispatcher, platform, _) = setup().await;

        let reply = run(&dispatcher, &platform, 3, "69 help").await.unwrap();
        assert_eq!(reply.lifetime, Some(std::time::Duration::from_secs(10)));
        for info in COMMANDS {
            assert!(reply.text.contains(info.usage), "missing {}", info.name);
        }

        let reply = run(&dispatcher, &platform, 3, "69 help timeout").await.unwrap();
        assert!(reply.text.starts_with("Usage: 69 timeout <user> <duration> [reason]"));
    }

    #[tokio::test]
    async fn test_afk_toggles() {
        let (dispatcher, platform, _) = setup().await;

        let reply = run(&dispatcher, &platform, 3, "69 afk").await.unwrap();
        assert_eq!(reply.text, "<@3> is now AFK. Reason: No reason given.");
        assert!(reply.is_ephemeral());
        assert_eq!(platform.display_name(COMMUNITY, 3).await.as_deref(), Some("[AFK] troll"));

        let reply = run(&dispatcher, &platform, 3, "69 afk").await.unwrap();
        assert_eq!(reply.text, welcome_back("<@3>"));
        assert_eq!(platform.display_name(COMMUNITY, 3).await.as_deref(), Some("troll"));
    }

    #[tokio::test]
    async fn test_missing_arguments_show_usage() {
        let (dispatcher, platform, _) = setup().await;

        let reply = run(&dispatcher, &platform, 2, "69 kick").await.unwrap();
        assert!(reply.text.starts_with("Usage: 69 kick <user> [reason]"));

        let reply = run(&dispatcher, &platform, 2, "69 warn <@3>").await.unwrap();
        assert!(reply.text.starts_with("Usage: 69 warn"));

        let reply = run(&dispatcher, &platform, 2, "69 timeout <@3> forever").await.unwrap();
        assert!(reply.text.starts_with("Usage: 69 timeout"));

        let reply = run(&dispatcher, &platform, 2, "69 clear lots").await.unwrap();
        assert!(reply.text.starts_with("Usage: 69 clear <amount> [user]"));
    }

    #[tokio::test]
    async fn test_errors_are_rendered() {
        let (dispatcher, platform, _) = setup().await;

        let reply = run(&dispatcher, &platform, 3, "69 kick <@2>").await.unwrap();
        assert_eq!(reply.text, "You don't have permission to use this command.");
        assert_eq!(reply.lifetime, Some(std::time::Duration::from_secs(3)));

        let reply = run(&dispatcher, &platform, 2, "69 ban ghost").await.unwrap();
        assert_eq!(reply.text, "User not found.");

        let reply = run(&dispatcher, &platform, 2, "69 removetimeout troll").await.unwrap();
        assert_eq!(reply.text, "That user is not timed out.");
    }

    #[tokio::test]
    async fn test_timeout_accepts_spaced_duration() {
        let (dispatcher, platform, _) = setup().await;

        let reply = run(&dispatcher, &platform, 2, "69 timeout troll 2 hours being loud")
            .await
            .unwrap();
        assert!(reply.text.contains("for 2h"), "{}", reply.text);
        assert!(reply.text.ends_with("Reason: being loud"));
        assert!(!reply.is_ephemeral());
        assert!(platform.timed_out_until(COMMUNITY, 3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_warn_reports_count_and_escalation() {
        let (dispatcher, platform, persistence) = setup().await;

        run(&dispatcher, &platform, 2, "69 warn <@3> one").await.unwrap();
        run(&dispatcher, &platform, 2, "69 warn <@3> two").await.unwrap();
        let reply = run(&dispatcher, &platform, 2, "69 warn <@3> three").await.unwrap();
        assert!(reply.text.contains("Total warnings: 3"));
        assert!(reply.text.contains("has been timed out until"));

        let reply = run(&dispatcher, &platform, 2, "69 warns").await.unwrap();
        assert_eq!(reply.text, "Warned members\n<@3>: 3 warning(s)");

        let reply = run(&dispatcher, &platform, 2, "69 warns troll").await.unwrap();
        assert!(reply.text.starts_with("Warnings for troll"));
        assert!(reply.text.contains("Warning 3: by <@2>, three"));

        let reply = run(&dispatcher, &platform, 2, "69 clearwarns troll").await.unwrap();
        assert_eq!(reply.text, "Removed 3 warning(s) from <@3>");
        assert!(persistence.warnings(COMMUNITY, 3).await.unwrap().is_empty());

        let reply = run(&dispatcher, &platform, 2, "69 warns troll").await.unwrap();
        assert_eq!(reply.text, "<@3> has no warnings.");
    }

    #[tokio::test]
    async fn test_clear_reports_deleted_count() {
        let (dispatcher, platform, _) = setup().await;
        for _ in 0..5 {
            platform.post(CHANNEL, 3, "spam").await.unwrap();
        }

        let reply = run(&dispatcher, &platform, 2, "69 clear 3 troll").await.unwrap();
        assert_eq!(reply.text, "Deleted 3 message(s).");
        assert_eq!(reply.lifetime, Some(std::time::Duration::from_secs(5)));
        assert_eq!(platform.messages(CHANNEL).await.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_with_oversized_amount_clamps() {
        let (dispatcher, platform, _) = setup().await;
        for _ in 0..5 {
            platform.post(CHANNEL, 3, "spam").await.unwrap();
        }

        let reply = run(&dispatcher, &platform, 2, "69 clear 99999999999999999999").await.unwrap();
        assert_eq!(reply.text, "Deleted 5 message(s).");
        assert!(platform.messages(CHANNEL).await.is_empty());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50"), Some(50));
        assert_eq!(parse_amount("-3"), Some(-3));
        assert_eq!(parse_amount("99999999999999999999"), Some(i64::MAX));
        assert_eq!(parse_amount("-99999999999999999999"), Some(i64::MIN));
        assert_eq!(parse_amount("ten"), None);
        assert_eq!(parse_amount("-"), None);
    }

    #[tokio::test]
    async fn test_log_channel_commands() {
        let (dispatcher, platform, persistence) = setup().await;

        let reply = run(&dispatcher, &platform, 2, "69 setlogschannel <#500>").await.unwrap();
        assert_eq!(reply.text, "Logs channel set to <#500>");
        assert_eq!(persistence.log_channel(COMMUNITY).await.unwrap(), Some(500));

        run(&dispatcher, &platform, 2, "69 kick troll").await.unwrap();
        assert_eq!(platform.audit_entries().await.len(), 1);

        let reply = run(&dispatcher, &platform, 2, "69 removelogschannel").await.unwrap();
        assert_eq!(reply.text, "Logs channel removed.");
    }

    #[tokio::test]
    async fn test_rating_commands() {
        let (dispatcher, platform, _) = setup().await;

        let reply = run(&dispatcher, &platform, 3, "69 rating logo").await.unwrap();
        assert_eq!(reply.text, "logo has no ratings yet.");

        run(&dispatcher, &platform, 3, "69 rate logo 3").await.unwrap();
        let reply = run(&dispatcher, &platform, 2, "69 rate logo 4").await.unwrap();
        assert!(reply.text.ends_with("Average: 3.5 from 2 vote(s)"));

        let reply = run(&dispatcher, &platform, 2, "69 rate logo 9").await.unwrap();
        assert_eq!(reply.text, "Score must be a whole number from 1 to 5.");

        let reply = run(&dispatcher, &platform, 2, "69 rating logo").await.unwrap();
        assert_eq!(reply.text, "logo: 3.5/5 from 2 vote(s)");
    }
}
