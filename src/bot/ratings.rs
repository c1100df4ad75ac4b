use log::debug;

use crate::storage::Persistence;
use crate::types::{ModerationError, ModerationResult, RatingSummary, UserId};

pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 5;

/// One vote per rater per item; a repeat vote replaces the earlier one
pub struct RatingTracker {
    persistence: Persistence,
}

impl RatingTracker {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    pub async fn cast_vote(
        &self,
        item: &str,
        rater: UserId,
        score: i64,
    ) -> ModerationResult<RatingSummary> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(ModerationError::InvalidScore(score));
        }

        let tally = self.persistence.put_vote(item, rater, score as u8).await?;
        let summary = tally.summary();
        debug!(
            "User {} rated '{}' {} (now {:.1} from {} votes)",
            rater, item, score, summary.average, summary.vote_count
        );
        Ok(summary)
    }

    pub async fn summary(&self, item: &str) -> ModerationResult<RatingSummary> {
        Ok(self.persistence.rating(item).await?.summary())
    }
}
