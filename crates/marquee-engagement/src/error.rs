use std::time::Duration;

use thiserror::Error;

use marquee_types::StoreError;

pub type Result<T> = std::result::Result<T, EngagementError>;

#[derive(Debug, Clone, Error)]
pub enum EngagementError {
    /// No acting user; rejected before any write
    #[error("sign-in required")]
    Unauthenticated,

    /// Referenced content, repost or comment is absent
    #[error("{0} not found")]
    NotFound(String),

    /// Only the owner may perform the operation
    #[error("only the owner can {0}")]
    Forbidden(&'static str),

    /// A uniqueness constraint rejected a write
    #[error("conflict: {0}")]
    Conflict(String),

    /// Input rejected before reaching the store
    #[error("invalid input: {0}")]
    Invalid(String),

    /// The same mutation is already in flight for this key
    #[error("{0} already in flight")]
    Busy(String),

    /// A store call exceeded the request timeout. The write may still land;
    /// the caller should re-read state before retrying.
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    /// Network or store failure on any step
    #[error("remote failure: {0}")]
    Remote(#[source] StoreError),

    /// One of the feed sources failed; the whole feed is unavailable
    #[error("feed source {stream} failed: {source}")]
    PartialFeed {
        stream: &'static str,
        source: Box<EngagementError>,
    },
}

impl EngagementError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Whether a user-initiated retry can succeed without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Remote(_) | Self::PartialFeed { .. } | Self::Busy(_))
    }
}

impl From<StoreError> for EngagementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => Self::Conflict(detail),
            other => Self::Remote(other),
        }
    }
}
