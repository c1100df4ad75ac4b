// src/config/mod.rs - YAML configuration with defaults and validation

use anyhow::{Context, Result};
use chrono::Duration;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

const BOT_CONFIG_FILE: &str = "bot.yaml";

/// Longest timeout a platform accepts, 28 days
pub const MAX_ESCALATION_TIMEOUT_SECONDS: u64 = 28 * 24 * 60 * 60;

/// Top-level bot configuration, stored as `bot.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfiguration {
    pub version: String,
    #[serde(default)]
    pub core: CoreSettings,
    #[serde(default)]
    pub moderation: ModerationSettings,
    #[serde(default)]
    pub afk: AfkSettings,
    #[serde(default)]
    pub notices: NoticeSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    pub bot_name: String,
    /// Text every command starts with, including any trailing space
    pub command_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    /// Warning count at which an automatic timeout is applied
    pub warning_threshold: usize,
    pub escalation_timeout_seconds: u64,
    /// Upper bound for the clear command
    pub clear_max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AfkSettings {
    pub name_prefix: String,
    pub max_display_name_length: usize,
    pub default_reason: String,
}

/// Lifetimes of auto-deleted replies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeSettings {
    pub ephemeral_seconds: u64,
    pub help_seconds: u64,
    pub clear_report_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    JsonFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            bot_name: "Warden".to_string(),
            command_prefix: "69 ".to_string(),
        }
    }
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            warning_threshold: 3,
            escalation_timeout_seconds: 3600,
            clear_max: 100,
        }
    }
}

impl ModerationSettings {
    /// `None` if the configured length does not fit a `Duration`
    pub fn escalation_timeout(&self) -> Option<Duration> {
        i64::try_from(self.escalation_timeout_seconds)
            .ok()
            .and_then(Duration::try_seconds)
    }
}

impl Default for AfkSettings {
    fn default() -> Self {
        Self {
            name_prefix: "[AFK]".to_string(),
            max_display_name_length: 32,
            default_reason: "No reason given.".to_string(),
        }
    }
}

impl Default for NoticeSettings {
    fn default() -> Self {
        Self {
            ephemeral_seconds: 3,
            help_seconds: 10,
            clear_report_seconds: 5,
        }
    }
}

impl NoticeSettings {
    pub fn ephemeral(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ephemeral_seconds)
    }

    pub fn help(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.help_seconds)
    }

    pub fn clear_report(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.clear_report_seconds)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::JsonFile,
            path: PathBuf::from("data/warden.json"),
        }
    }
}

impl Default for BotConfiguration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            core: CoreSettings::default(),
            moderation: ModerationSettings::default(),
            afk: AfkSettings::default(),
            notices: NoticeSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl BotConfiguration {
    /// Apply `WARDEN_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(prefix) = env::var("WARDEN_PREFIX") {
            self.core.command_prefix = prefix;
        }
        if let Ok(path) = env::var("WARDEN_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(backend) = env::var("WARDEN_STORAGE_BACKEND") {
            match backend.as_str() {
                "memory" => self.storage.backend = StorageBackend::Memory,
                "json_file" => self.storage.backend = StorageBackend::JsonFile,
                other => warn!("Ignoring unknown WARDEN_STORAGE_BACKEND '{}'", other),
            }
        }
    }
}

/// Configuration validation
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_bot_config(&self, config: &BotConfiguration) -> Result<()> {
        if config.core.command_prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("core.command_prefix must not be empty"));
        }
        if config.moderation.warning_threshold == 0 {
            return Err(anyhow::anyhow!("moderation.warning_threshold must be at least 1"));
        }
        if config.moderation.escalation_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("moderation.escalation_timeout_seconds must be positive"));
        }
        if config.moderation.escalation_timeout_seconds > MAX_ESCALATION_TIMEOUT_SECONDS {
            return Err(anyhow::anyhow!(
                "moderation.escalation_timeout_seconds ({}) exceeds {} (28 days)",
                config.moderation.escalation_timeout_seconds,
                MAX_ESCALATION_TIMEOUT_SECONDS
            ));
        }
        if config.moderation.clear_max == 0 {
            return Err(anyhow::anyhow!("moderation.clear_max must be at least 1"));
        }
        // Room for the prefix, a space and at least one character of the name
        if config.afk.max_display_name_length < config.afk.name_prefix.chars().count() + 2 {
            return Err(anyhow::anyhow!(
                "afk.max_display_name_length ({}) is too short for prefix '{}'",
                config.afk.max_display_name_length,
                config.afk.name_prefix
            ));
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads, validates and saves the bot configuration
#[derive(Clone)]
pub struct ConfigurationManager {
    config_dir: PathBuf,
    bot_config: Arc<RwLock<BotConfiguration>>,
    validator: Arc<ConfigValidator>,
}

impl ConfigurationManager {
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            bot_config: Arc::new(RwLock::new(BotConfiguration::default())),
            validator: Arc::new(ConfigValidator::new()),
        }
    }

    /// Load `bot.yaml`, writing a default file first if none exists
    pub async fn initialize(&self) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)
                .await
                .with_context(|| {
                    format!("Failed to create config directory: {}", self.config_dir.display())
                })?;
            info!("Created configuration directory: {}", self.config_dir.display());
        }

        let config_path = self.config_path();
        if !config_path.exists() {
            warn!("Bot config not found, creating default: {}", config_path.display());
            self.save_bot_config(BotConfiguration::default()).await?;
        }

        self.reload().await?;
        info!("Configuration manager initialized successfully");
        Ok(())
    }

    /// Re-read `bot.yaml`; the cached configuration is kept if it is invalid
    pub async fn reload(&self) -> Result<()> {
        let config_path = self.config_path();
        let content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read bot config: {}", config_path.display()))?;

        let config: BotConfiguration = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse bot config: {}", config_path.display()))?;

        self.validator.validate_bot_config(&config)?;
        *self.bot_config.write().await = config;

        debug!("Loaded bot configuration from {}", config_path.display());
        Ok(())
    }

    pub async fn get_bot_config(&self) -> BotConfiguration {
        self.bot_config.read().await.clone()
    }

    pub async fn save_bot_config(&self, config: BotConfiguration) -> Result<()> {
        self.validator.validate_bot_config(&config)?;

        let config_path = self.config_path();
        let content = serde_yaml::to_string(&config).context("Failed to serialize bot config")?;
        fs::write(&config_path, content)
            .await
            .with_context(|| format!("Failed to write bot config: {}", config_path.display()))?;

        *self.bot_config.write().await = config;
        info!("Saved bot configuration to {}", config_path.display());
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(BOT_CONFIG_FILE)
    }
}
