// src/types/errors.rs - Error taxonomy for the moderation core

use log::debug;
use std::fmt;
use thiserror::Error;

/// Failures of the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures reported by the chat platform
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform rejected the request: {0}")]
    Rejected(String),

    #[error("not found on the platform: {0}")]
    NotFound(String),

    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Outcome errors of moderation, AFK and rating operations.
///
/// Everything except `StoreUnavailable` is a business-rule rejection and must
/// never be retried.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("target not found")]
    TargetNotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("platform rejected the action: {0}")]
    PlatformRejected(String),

    #[error("invalid duration: '{0}'")]
    InvalidDuration(String),

    #[error("invalid score: {0} (expected 1-5)")]
    InvalidScore(i64),

    #[error("user is already AFK")]
    AlreadyAfk,

    #[error("user is not timed out")]
    NotTimedOut,

    #[error("cannot target yourself")]
    SelfTarget,

    #[error("cannot target a bot account")]
    BotTarget,

    #[error("a reason is required")]
    MissingReason,

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl ModerationError {
    /// Whether a caller may retry the operation
    pub fn is_transient(&self) -> bool {
        matches!(self, ModerationError::StoreUnavailable(_))
    }
}

impl From<PlatformError> for ModerationError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(_) => ModerationError::TargetNotFound,
            PlatformError::Rejected(reason) | PlatformError::Unavailable(reason) => {
                ModerationError::PlatformRejected(reason)
            }
        }
    }
}

pub type ModerationResult<T> = Result<T, ModerationError>;

/// Failures while delivering an audit entry
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("log channel lookup failed: {0}")]
    Lookup(#[from] StoreError),

    #[error("log delivery failed: {0}")]
    Delivery(#[from] PlatformError),
}

/// Result of an operation whose failure must not fail the surrounding action.
///
/// The value has to be discharged with [`BestEffort::acknowledge`], which logs
/// and drops the failure.
#[must_use = "best-effort results must be acknowledged"]
#[derive(Debug)]
pub struct BestEffort<T, E = PlatformError>(Result<T, E>);

impl<T, E: fmt::Display> BestEffort<T, E> {
    pub fn new(result: Result<T, E>) -> Self {
        Self(result)
    }

    pub fn succeeded(&self) -> bool {
        self.0.is_ok()
    }

    /// Discard a failure, keeping the value on success
    pub fn acknowledge(self, operation: &str) -> Option<T> {
        match self.0 {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Ignoring failed {}: {}", operation, e);
                None
            }
        }
    }
}

impl<T, E> From<Result<T, E>> for BestEffort<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Self(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_failures_are_transient() {
        let store = ModerationError::from(StoreError::Unavailable("down".to_string()));
        assert!(store.is_transient());
        assert!(!ModerationError::PermissionDenied.is_transient());
        assert!(!ModerationError::PlatformRejected("hierarchy".to_string()).is_transient());
    }

    #[test]
    fn test_platform_errors_map_to_moderation_errors() {
        let err: ModerationError = PlatformError::NotFound("user".to_string()).into();
        assert!(matches!(err, ModerationError::TargetNotFound));

        let err: ModerationError = PlatformError::Rejected("role hierarchy".to_string()).into();
        assert!(matches!(err, ModerationError::PlatformRejected(r) if r == "role hierarchy"));
    }

    #[test]
    fn test_best_effort_acknowledge() {
        let ok: BestEffort<u32> = BestEffort::new(Ok(7));
        assert!(ok.succeeded());
        assert_eq!(ok.acknowledge("test"), Some(7));

        let failed: BestEffort<u32> =
            BestEffort::new(Err(PlatformError::Rejected("nope".to_string())));
        assert!(!failed.succeeded());
        assert_eq!(failed.acknowledge("test"), None);
    }
}
