//! # Warden
//!
//! A chat-community moderation bot engine. Moderation commands, AFK status,
//! audit logging and item ratings run against any chat platform that
//! implements the [`platforms::Platform`] trait.
//!
//! ## Features
//!
//! - **Moderation**: kick, ban, unban, timeouts, escalating warnings, bulk message removal
//! - **AFK Tracking**: display-name marker, welcome-back and mention notices
//! - **Audit Logging**: every moderation action routed to a per-community log channel
//! - **Ratings**: one 1-5 vote per user and item with a running average
//! - **Pluggable Storage**: in-memory or JSON file key-value stores
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BotConfiguration::default();
//!     let platform = Arc::new(MemoryPlatform::new(Member::bot(1, "warden")));
//!     let store = Warden::open_store(&config.storage).await?;
//!
//!     let bot = Arc::new(Warden::new(config, platform, store));
//!     bot.start()?.await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod platforms;
pub mod storage;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::notices::Reply;
    pub use crate::bot::Warden;
    pub use crate::config::{BotConfiguration, ConfigurationManager, StorageBackend};
    pub use crate::platforms::{memory::MemoryPlatform, Platform};
    pub use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore, Persistence};
    pub use crate::types::{
        Capability, InboundMessage, Member, ModerationError, ModerationResult, TargetRef,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
