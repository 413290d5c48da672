use std::collections::{HashMap, HashSet};

use rusqlite::ErrorCode;
use tracing::debug;
use uuid::Uuid;

use marquee_types::events::NotificationEvent;
use marquee_types::models::{
    AuthoredContent, CommentRecord, Counters, LikeRecord, Profile, Repost, ShareRecord,
};
use marquee_types::{
    BaseKind, ContentKind, Counter, Interaction, Namespace, NotificationSink, Store, StoreError,
    StoreResult,
};

use crate::Database;
use crate::queries;

/// Classifies a database failure for the engagement core. Uniqueness and
/// primary key violations become [`StoreError::Conflict`].
pub fn store_error(err: anyhow::Error) -> StoreError {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, msg)) => {
            let detail = msg.clone().unwrap_or_else(|| e.to_string());
            match e.code {
                ErrorCode::ConstraintViolation
                    if matches!(
                        e.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    ) =>
                {
                    StoreError::Conflict(detail)
                }
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Unavailable(detail),
                _ => StoreError::Backend(detail),
            }
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

impl Database {
    fn run<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> anyhow::Result<T>) -> StoreResult<T> {
        self.with_conn(f).map_err(store_error)
    }
}

impl Store for Database {
    fn owner_of(&self, namespace: Namespace) -> StoreResult<Option<Uuid>> {
        self.run(|conn| queries::owner_of(conn, namespace))
    }

    fn counters(&self, namespace: Namespace) -> StoreResult<Option<Counters>> {
        self.run(|conn| queries::counters(conn, namespace))
    }

    fn list_published(&self, kind: BaseKind, limit: u32) -> StoreResult<Vec<AuthoredContent>> {
        self.run(|conn| queries::list_published(conn, kind, limit))
    }

    fn get_contents(&self, kind: BaseKind, ids: &[Uuid]) -> StoreResult<Vec<AuthoredContent>> {
        self.run(|conn| queries::get_contents(conn, kind, ids))
    }

    fn delete_content(&self, kind: BaseKind, id: Uuid) -> StoreResult<bool> {
        self.run(|conn| queries::delete_content(conn, kind, id))
    }

    fn profiles(&self, user_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Profile>> {
        self.run(|conn| queries::profiles(conn, user_ids))
    }

    fn find_like(&self, namespace: Namespace, user_id: Uuid) -> StoreResult<Option<LikeRecord>> {
        self.run(|conn| queries::find_like(conn, namespace, user_id))
    }

    fn insert_like(&self, like: &LikeRecord) -> StoreResult<()> {
        self.run(|conn| queries::insert_like(conn, like))
    }

    fn delete_like(&self, namespace: Namespace, like_id: Uuid) -> StoreResult<bool> {
        self.run(|conn| queries::delete_interaction(conn, namespace, Interaction::Like, like_id))
    }

    fn liked_ids(&self, kind: ContentKind, user_id: Uuid, ids: &[Uuid]) -> StoreResult<HashSet<Uuid>> {
        self.run(|conn| queries::liked_ids(conn, kind, user_id, ids))
    }

    fn insert_comment(&self, comment: &CommentRecord) -> StoreResult<()> {
        self.run(|conn| queries::insert_comment(conn, comment))
    }

    fn get_comment(&self, namespace: Namespace, comment_id: Uuid) -> StoreResult<Option<CommentRecord>> {
        self.run(|conn| queries::get_comment(conn, namespace, comment_id))
    }

    fn delete_comment(&self, namespace: Namespace, comment_id: Uuid) -> StoreResult<bool> {
        self.run(|conn| queries::delete_interaction(conn, namespace, Interaction::Comment, comment_id))
    }

    fn list_comments(&self, namespace: Namespace) -> StoreResult<Vec<CommentRecord>> {
        self.run(|conn| queries::list_comments(conn, namespace))
    }

    fn insert_share(&self, share: &ShareRecord) -> StoreResult<()> {
        self.run(|conn| queries::insert_share(conn, share))
    }

    fn delete_share(&self, namespace: Namespace, share_id: Uuid) -> StoreResult<bool> {
        self.run(|conn| queries::delete_interaction(conn, namespace, Interaction::Share, share_id))
    }

    fn count_rows(&self, namespace: Namespace, interaction: Interaction) -> StoreResult<u64> {
        self.run(|conn| queries::count_rows(conn, namespace, interaction))
    }

    fn increment_count(&self, namespace: Namespace, counter: Counter) -> StoreResult<u64> {
        let value = self.run(|conn| queries::adjust_count(conn, namespace, counter, 1))?;
        debug!("{} {} -> {}", namespace, counter.column(), value);
        Ok(value)
    }

    fn decrement_count(&self, namespace: Namespace, counter: Counter) -> StoreResult<u64> {
        let value = self.run(|conn| queries::adjust_count(conn, namespace, counter, -1))?;
        debug!("{} {} -> {}", namespace, counter.column(), value);
        Ok(value)
    }

    fn set_count(&self, namespace: Namespace, counter: Counter, value: u64) -> StoreResult<()> {
        self.run(|conn| queries::set_count(conn, namespace, counter, value))
    }

    fn find_repost(&self, kind: BaseKind, user_id: Uuid, content_id: Uuid) -> StoreResult<Option<Repost>> {
        self.run(|conn| queries::find_repost(conn, kind, user_id, content_id))
    }

    fn get_repost(&self, kind: BaseKind, repost_id: Uuid) -> StoreResult<Option<Repost>> {
        self.run(|conn| queries::get_repost(conn, kind, repost_id))
    }

    fn insert_repost(&self, repost: &Repost) -> StoreResult<()> {
        self.run(|conn| queries::insert_repost(conn, repost))
    }

    fn delete_repost(&self, kind: BaseKind, repost_id: Uuid) -> StoreResult<bool> {
        self.run(|conn| queries::delete_repost(conn, kind, repost_id))
    }

    fn list_reposts(&self, kind: BaseKind, limit: u32) -> StoreResult<Vec<Repost>> {
        self.run(|conn| queries::list_reposts(conn, kind, limit))
    }

    fn reposted_ids(
        &self,
        kind: BaseKind,
        user_id: Uuid,
        content_ids: &[Uuid],
    ) -> StoreResult<HashSet<Uuid>> {
        self.run(|conn| queries::reposted_ids(conn, kind, user_id, content_ids))
    }

    fn count_reposts(&self, kind: BaseKind, content_id: Uuid) -> StoreResult<u64> {
        self.run(|conn| queries::count_reposts(conn, kind, content_id))
    }
}

impl NotificationSink for Database {
    fn deliver(&self, event: &NotificationEvent) -> StoreResult<()> {
        self.insert_notification(event).map(|_| ()).map_err(store_error)
    }
}
