//! Persistence contract consumed by the engagement core.
//!
//! Every method is one request/response round trip against the store. The
//! store must enforce uniqueness of likes per `(user, namespace)` and of
//! reposts per `(user, content)` and report violations as
//! [`StoreError::Conflict`]. Counter adjustments must apply atomically
//! server-side; decrements never go below zero.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

use crate::events::NotificationEvent;
use crate::models::{
    AuthoredContent, CommentRecord, Counters, LikeRecord, Profile, Repost, ShareRecord,
};
use crate::namespace::{BaseKind, ContentKind, Counter, Interaction, Namespace};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store could not be reached or the call was abandoned
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other failure reported by the store
    #[error("store error: {0}")]
    Backend(String),
}

pub trait Store: Send + Sync {
    // -- Content --

    /// Owner of a namespace's parent row: the author for content, the
    /// reposting user for reposts.
    fn owner_of(&self, namespace: Namespace) -> StoreResult<Option<Uuid>>;

    fn counters(&self, namespace: Namespace) -> StoreResult<Option<Counters>>;

    /// Newest-first published items of one kind, joined with author profiles.
    fn list_published(&self, kind: BaseKind, limit: u32) -> StoreResult<Vec<AuthoredContent>>;

    fn get_contents(&self, kind: BaseKind, ids: &[Uuid]) -> StoreResult<Vec<AuthoredContent>>;

    /// Deletes the item together with its interaction rows and reposts.
    fn delete_content(&self, kind: BaseKind, id: Uuid) -> StoreResult<bool>;

    fn profiles(&self, user_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Profile>>;

    // -- Likes --

    fn find_like(&self, namespace: Namespace, user_id: Uuid) -> StoreResult<Option<LikeRecord>>;

    fn insert_like(&self, like: &LikeRecord) -> StoreResult<()>;

    fn delete_like(&self, namespace: Namespace, like_id: Uuid) -> StoreResult<bool>;

    /// Which of `ids` (all of the same content kind) the user has liked.
    fn liked_ids(&self, kind: ContentKind, user_id: Uuid, ids: &[Uuid])
    -> StoreResult<HashSet<Uuid>>;

    // -- Comments --

    fn insert_comment(&self, comment: &CommentRecord) -> StoreResult<()>;

    fn get_comment(&self, namespace: Namespace, comment_id: Uuid)
    -> StoreResult<Option<CommentRecord>>;

    fn delete_comment(&self, namespace: Namespace, comment_id: Uuid) -> StoreResult<bool>;

    /// Oldest first.
    fn list_comments(&self, namespace: Namespace) -> StoreResult<Vec<CommentRecord>>;

    // -- Shares --

    fn insert_share(&self, share: &ShareRecord) -> StoreResult<()>;

    fn delete_share(&self, namespace: Namespace, share_id: Uuid) -> StoreResult<bool>;

    // -- Counters --

    /// Number of rows in one interaction table for the namespace.
    fn count_rows(&self, namespace: Namespace, interaction: Interaction) -> StoreResult<u64>;

    /// Atomically adds one to the counter and returns the new value.
    fn increment_count(&self, namespace: Namespace, counter: Counter) -> StoreResult<u64>;

    /// Atomically subtracts one, flooring at zero, and returns the new value.
    fn decrement_count(&self, namespace: Namespace, counter: Counter) -> StoreResult<u64>;

    fn set_count(&self, namespace: Namespace, counter: Counter, value: u64) -> StoreResult<()>;

    // -- Reposts --

    fn find_repost(&self, kind: BaseKind, user_id: Uuid, content_id: Uuid)
    -> StoreResult<Option<Repost>>;

    fn get_repost(&self, kind: BaseKind, repost_id: Uuid) -> StoreResult<Option<Repost>>;

    fn insert_repost(&self, repost: &Repost) -> StoreResult<()>;

    /// Deletes the repost and every like, comment and share in its namespace.
    fn delete_repost(&self, kind: BaseKind, repost_id: Uuid) -> StoreResult<bool>;

    /// Newest first.
    fn list_reposts(&self, kind: BaseKind, limit: u32) -> StoreResult<Vec<Repost>>;

    fn reposted_ids(&self, kind: BaseKind, user_id: Uuid, content_ids: &[Uuid])
    -> StoreResult<HashSet<Uuid>>;

    fn count_reposts(&self, kind: BaseKind, content_id: Uuid) -> StoreResult<u64>;
}

/// Destination for notification events. Delivery is best-effort.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, event: &NotificationEvent) -> StoreResult<()>;
}
