// src/storage/mod.rs - Key-value persistence for AFK, warnings, log channels and ratings

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::types::{
    AfkRecord, ChannelId, CommunityId, RatingTally, StoreError, UserId, WarningEntry,
};

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-modify-write step applied under the store's write lock
pub type UpdateFn = Box<dyn FnOnce(Option<Value>) -> StoreResult<Value> + Send>;

/// Storage-technology-agnostic document store keyed by strings
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Insert or replace; last write wins
    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Returns whether a value was removed
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    async fn list_by_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>>;

    /// Atomically replace the value at `key` with `apply(current)`.
    /// Concurrent updates of the same key never observe each other's
    /// intermediate state.
    async fn update(&self, key: &str, apply: UpdateFn) -> StoreResult<Value>;

    fn backend_name(&self) -> &str;
}

mod keys {
    use crate::types::{CommunityId, UserId};

    pub fn afk(user: UserId) -> String {
        format!("afk/{}", user)
    }

    pub fn warnings(community: CommunityId, user: UserId) -> String {
        format!("warnings/{}/{}", community, user)
    }

    pub fn log_channel(community: CommunityId) -> String {
        format!("logchannel/{}", community)
    }

    pub fn rating(item: &str) -> String {
        format!("ratings/{}", item)
    }
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> StoreResult<Option<T>> {
    value.map(serde_json::from_value).transpose().map_err(StoreError::from)
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(StoreError::from)
}

/// Typed access to the four record kinds
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &str {
        self.store.backend_name()
    }

    // AFK

    pub async fn afk(&self, user: UserId) -> StoreResult<Option<AfkRecord>> {
        decode(self.store.get(&keys::afk(user)).await?)
    }

    pub async fn put_afk(&self, user: UserId, record: &AfkRecord) -> StoreResult<()> {
        self.store.set(&keys::afk(user), encode(record)?).await
    }

    pub async fn delete_afk(&self, user: UserId) -> StoreResult<bool> {
        self.store.delete(&keys::afk(user)).await
    }

    // Warnings

    /// Append a warning and return the resulting count for the pair
    pub async fn append_warning(
        &self,
        community: CommunityId,
        user: UserId,
        entry: WarningEntry,
    ) -> StoreResult<usize> {
        let updated = self
            .store
            .update(
                &keys::warnings(community, user),
                Box::new(move |current| {
                    let mut entries: Vec<WarningEntry> = decode(current)?.unwrap_or_default();
                    entries.push(entry);
                    encode(&entries)
                }),
            )
            .await?;

        let entries: Vec<WarningEntry> = serde_json::from_value(updated)?;
        debug!(
            "Warning appended for user {} in community {} (total {})",
            user,
            community,
            entries.len()
        );
        Ok(entries.len())
    }

    pub async fn warnings(
        &self,
        community: CommunityId,
        user: UserId,
    ) -> StoreResult<Vec<WarningEntry>> {
        Ok(decode(self.store.get(&keys::warnings(community, user)).await?)?.unwrap_or_default())
    }

    /// Purge all warnings of a user in a community, returning how many were removed
    pub async fn clear_warnings(&self, community: CommunityId, user: UserId) -> StoreResult<usize> {
        let removed = self.warnings(community, user).await?.len();
        self.store.delete(&keys::warnings(community, user)).await?;
        Ok(removed)
    }

    /// Users with at least one warning in the community
    pub async fn warned_users(&self, community: CommunityId) -> StoreResult<Vec<(UserId, usize)>> {
        let prefix = format!("warnings/{}/", community);
        let mut users = Vec::new();
        for (key, value) in self.store.list_by_prefix(&prefix).await? {
            let Some(user) = key.strip_prefix(&prefix).and_then(|u| u.parse::<UserId>().ok()) else {
                continue;
            };
            let entries: Vec<WarningEntry> = serde_json::from_value(value)?;
            users.push((user, entries.len()));
        }
        Ok(users)
    }

    // Log channel mapping

    pub async fn log_channel(&self, community: CommunityId) -> StoreResult<Option<ChannelId>> {
        decode(self.store.get(&keys::log_channel(community)).await?)
    }

    pub async fn set_log_channel(
        &self,
        community: CommunityId,
        channel: ChannelId,
    ) -> StoreResult<()> {
        self.store.set(&keys::log_channel(community), encode(&channel)?).await
    }

    pub async fn remove_log_channel(&self, community: CommunityId) -> StoreResult<bool> {
        self.store.delete(&keys::log_channel(community)).await
    }

    // Ratings

    pub async fn rating(&self, item: &str) -> StoreResult<RatingTally> {
        Ok(decode(self.store.get(&keys::rating(item)).await?)?.unwrap_or_default())
    }

    /// Record a vote, replacing any earlier vote of the same rater
    pub async fn put_vote(&self, item: &str, rater: UserId, score: u8) -> StoreResult<RatingTally> {
        let updated = self
            .store
            .update(
                &keys::rating(item),
                Box::new(move |current| {
                    let mut tally: RatingTally = decode(current)?.unwrap_or_default();
                    tally.votes.insert(rater, score);
                    encode(&tally)
                }),
            )
            .await?;

        Ok(serde_json::from_value(updated)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn persistence() -> Persistence {
        Persistence::new(Arc::new(MemoryStore::new()))
    }

    fn warning(moderator: UserId, reason: &str) -> WarningEntry {
        WarningEntry {
            id: uuid::Uuid::new_v4(),
            moderator_id: moderator,
            reason: Some(reason.to_string()),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_warnings_are_partitioned_by_community() {
        let store = persistence();

        assert_eq!(store.append_warning(1, 42, warning(7, "spam")).await.unwrap(), 1);
        assert_eq!(store.append_warning(1, 42, warning(7, "more spam")).await.unwrap(), 2);
        assert_eq!(store.append_warning(2, 42, warning(7, "elsewhere")).await.unwrap(), 1);

        let entries = store.warnings(1, 42).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].reason.as_deref(), Some("spam"));
        assert_eq!(entries[1].reason.as_deref(), Some("more spam"));

        let warned = store.warned_users(1).await.unwrap();
        assert_eq!(warned, vec![(42, 2)]);
    }

    #[tokio::test]
    async fn test_clear_warnings() {
        let store = persistence();
        store.append_warning(1, 42, warning(7, "spam")).await.unwrap();
        store.append_warning(1, 42, warning(7, "spam")).await.unwrap();

        assert_eq!(store.clear_warnings(1, 42).await.unwrap(), 2);
        assert!(store.warnings(1, 42).await.unwrap().is_empty());
        assert_eq!(store.clear_warnings(1, 42).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_log_channel_last_write_wins() {
        let store = persistence();
        assert_eq!(store.log_channel(1).await.unwrap(), None);

        store.set_log_channel(1, 100).await.unwrap();
        store.set_log_channel(1, 200).await.unwrap();
        assert_eq!(store.log_channel(1).await.unwrap(), Some(200));

        assert!(store.remove_log_channel(1).await.unwrap());
        assert_eq!(store.log_channel(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_vote_overwrites_same_rater() {
        let store = persistence();
        store.put_vote("clip-1", 5, 3).await.unwrap();
        let tally = store.put_vote("clip-1", 5, 5).await.unwrap();

        assert_eq!(tally.votes.len(), 1);
        assert_eq!(tally.votes.get(&5), Some(&5));
    }

    #[tokio::test]
    async fn test_afk_round_trip_and_delete() {
        let store = persistence();
        let record = AfkRecord {
            reason: "lunch".to_string(),
            original_display_name: "Alice".to_string(),
            community_id: 1,
            since: Utc::now(),
        };

        store.put_afk(9, &record).await.unwrap();
        assert_eq!(store.afk(9).await.unwrap(), Some(record));
        assert!(store.delete_afk(9).await.unwrap());
        assert!(!store.delete_afk(9).await.unwrap());
        assert_eq!(store.afk(9).await.unwrap(), None);
    }
}
