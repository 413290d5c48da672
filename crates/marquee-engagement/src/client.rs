use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use marquee_types::api::{CommentResponse, LikeOutcome, ShareOutcome};
use marquee_types::events::{LiveEvent, NotificationEvent, NotificationKind};
use marquee_types::models::{CommentRecord, Counters, LikeRecord, ShareRecord};
use marquee_types::{ContentKind, Counter, Namespace, Store, StoreResult};

use crate::error::{EngagementError, Result};
use crate::live::LiveUpdates;
use crate::notify::Notifier;
use crate::remote::Remote;
use crate::session::Session;

pub const MAX_COMMENT_CHARS: usize = 2000;

/// Likes, comments, shares and views against any engagement namespace.
///
/// Each mutation is a sequence of store round trips: a state check, the row
/// write, then the counter adjustment. If the counter call fails after the
/// row write landed, the row write is undone before the error is returned.
/// A counter call that timed out may still land, so its row write is kept.
#[derive(Clone)]
pub struct EngagementClient {
    remote: Remote,
    notifier: Notifier,
    live: LiveUpdates,
    origin: Arc<str>,
}

impl EngagementClient {
    pub fn new(remote: Remote, notifier: Notifier, live: LiveUpdates, origin: &str) -> Self {
        Self {
            remote,
            notifier,
            live,
            origin: Arc::from(origin.trim_end_matches('/')),
        }
    }

    pub fn remote(&self) -> &Remote {
        &self.remote
    }

    pub fn live(&self) -> &LiveUpdates {
        &self.live
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Owner of the namespace's parent row.
    pub async fn owner(&self, ns: Namespace) -> Result<Uuid> {
        self.remote
            .call("owner_of", move |s| s.owner_of(ns))
            .await?
            .ok_or_else(|| EngagementError::not_found(ns))
    }

    pub async fn counters(&self, ns: Namespace) -> Result<Counters> {
        self.remote
            .call("counters", move |s| s.counters(ns))
            .await?
            .ok_or_else(|| EngagementError::not_found(ns))
    }

    /// Which of `ids` the user has liked. Anonymous viewers like nothing.
    pub async fn liked_among(
        &self,
        kind: ContentKind,
        viewer: Option<Uuid>,
        ids: Vec<Uuid>,
    ) -> Result<HashSet<Uuid>> {
        let Some(user_id) = viewer else {
            return Ok(HashSet::new());
        };
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        self.remote
            .call("liked_ids", move |s| s.liked_ids(kind, user_id, &ids))
            .await
    }

    pub async fn is_liked(&self, ns: Namespace, user_id: Uuid) -> Result<bool> {
        let like = self.remote.call("find_like", move |s| s.find_like(ns, user_id)).await?;
        Ok(like.is_some())
    }

    pub fn share_url(&self, ns: Namespace) -> String {
        format!("{}/{}/{}", self.origin, ns.kind, ns.id)
    }

    // -- Likes --

    /// `NotLiked -> Liked -> NotLiked` for `(user, namespace)`.
    pub async fn toggle_like(&self, session: &Session, ns: Namespace) -> Result<LikeOutcome> {
        let user_id = session.require_user()?;
        let owner_id = self.owner(ns).await?;

        let existing = self
            .remote
            .call("find_like", move |s| s.find_like(ns, user_id))
            .await?;

        match existing {
            Some(like) => self.unlike(ns, like).await,
            None => self.like(ns, user_id, owner_id).await,
        }
    }

    async fn like(&self, ns: Namespace, user_id: Uuid, owner_id: Uuid) -> Result<LikeOutcome> {
        let like = LikeRecord {
            id: Uuid::new_v4(),
            user_id,
            namespace: ns,
            created_at: Utc::now(),
        };

        let record = like.clone();
        match self.remote.call("insert_like", move |s| s.insert_like(&record)).await {
            Ok(()) => {}
            Err(EngagementError::Conflict(detail)) => {
                // A concurrent toggle for the same key already inserted; the
                // winner owns the counter update.
                debug!("Like on {} raced another insert: {}", ns, detail);
                return self.like_state(ns, user_id).await;
            }
            Err(e) => return Err(e),
        }

        let like_count = match self
            .remote
            .call("increment_count", move |s| s.increment_count(ns, Counter::Likes))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                let like_id = like.id;
                self.compensate("like insert", ns, &e, move |s| s.delete_like(ns, like_id).map(drop))
                    .await;
                return Err(e);
            }
        };

        debug!("{} liked {} (count {})", user_id, ns, like_count);
        self.counter_changed(ns, Counter::Likes, like_count);
        if let Some(event) = NotificationEvent::addressed(NotificationKind::Like, user_id, owner_id, ns) {
            self.notifier.notify(event);
        }

        Ok(LikeOutcome {
            liked: true,
            like_count,
        })
    }

    async fn unlike(&self, ns: Namespace, like: LikeRecord) -> Result<LikeOutcome> {
        let like_id = like.id;
        let removed = self
            .remote
            .call("delete_like", move |s| s.delete_like(ns, like_id))
            .await?;

        if !removed {
            // Someone else removed it between the check and the delete.
            debug!("Like {} on {} already gone", like_id, ns);
            return self.like_state(ns, like.user_id).await;
        }

        let like_count = match self
            .remote
            .call("decrement_count", move |s| s.decrement_count(ns, Counter::Likes))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                self.compensate("like delete", ns, &e, move |s| s.insert_like(&like)).await;
                return Err(e);
            }
        };

        debug!("{} unliked {} (count {})", like.user_id, ns, like_count);
        self.counter_changed(ns, Counter::Likes, like_count);

        Ok(LikeOutcome {
            liked: false,
            like_count,
        })
    }

    /// Re-reads the authoritative like state after a lost race.
    async fn like_state(&self, ns: Namespace, user_id: Uuid) -> Result<LikeOutcome> {
        let liked = self.is_liked(ns, user_id).await?;
        let counters = self.counters(ns).await?;
        Ok(LikeOutcome {
            liked,
            like_count: counters.like_count,
        })
    }

    // -- Comments --

    pub async fn add_comment(
        &self,
        session: &Session,
        ns: Namespace,
        text: &str,
    ) -> Result<CommentResponse> {
        let user_id = session.require_user()?;
        let text = validate_comment(text)?;
        let owner_id = self.owner(ns).await?;

        let comment = CommentRecord {
            id: Uuid::new_v4(),
            user_id,
            namespace: ns,
            text,
            created_at: Utc::now(),
        };

        let record = comment.clone();
        self.remote
            .call("insert_comment", move |s| s.insert_comment(&record))
            .await?;

        let comment_count = match self
            .remote
            .call("increment_count", move |s| s.increment_count(ns, Counter::Comments))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                let comment_id = comment.id;
                self.compensate("comment insert", ns, &e, move |s| {
                    s.delete_comment(ns, comment_id).map(drop)
                })
                .await;
                return Err(e);
            }
        };

        self.counter_changed(ns, Counter::Comments, comment_count);
        if let Some(event) =
            NotificationEvent::addressed(NotificationKind::Comment, user_id, owner_id, ns)
        {
            self.notifier.notify(event);
        }

        Ok(CommentResponse {
            comment,
            comment_count,
        })
    }

    /// Only the comment's author may delete it. Returns the new comment count.
    pub async fn delete_comment(
        &self,
        session: &Session,
        ns: Namespace,
        comment_id: Uuid,
    ) -> Result<u64> {
        let user_id = session.require_user()?;

        let comment = self
            .remote
            .call("get_comment", move |s| s.get_comment(ns, comment_id))
            .await?
            .ok_or_else(|| EngagementError::not_found(format!("comment {}", comment_id)))?;

        if comment.user_id != user_id {
            warn!("{} tried to delete comment {} owned by {}", user_id, comment_id, comment.user_id);
            return Err(EngagementError::Forbidden("delete this comment"));
        }

        let removed = self
            .remote
            .call("delete_comment", move |s| s.delete_comment(ns, comment_id))
            .await?;
        if !removed {
            return Err(EngagementError::not_found(format!("comment {}", comment_id)));
        }

        let comment_count = match self
            .remote
            .call("decrement_count", move |s| s.decrement_count(ns, Counter::Comments))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                self.compensate("comment delete", ns, &e, move |s| s.insert_comment(&comment))
                    .await;
                return Err(e);
            }
        };

        self.counter_changed(ns, Counter::Comments, comment_count);
        Ok(comment_count)
    }

    pub async fn list_comments(&self, ns: Namespace) -> Result<Vec<CommentRecord>> {
        self.remote.call("list_comments", move |s| s.list_comments(ns)).await
    }

    // -- Shares and views --

    /// Every share is a new event; there is no undo.
    pub async fn record_share(&self, session: &Session, ns: Namespace) -> Result<ShareOutcome> {
        let user_id = session.require_user()?;
        self.owner(ns).await?;

        let share = ShareRecord {
            id: Uuid::new_v4(),
            user_id,
            namespace: ns,
            created_at: Utc::now(),
        };
        let share_id = share.id;
        self.remote.call("insert_share", move |s| s.insert_share(&share)).await?;

        let share_count = match self
            .remote
            .call("increment_count", move |s| s.increment_count(ns, Counter::Shares))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                self.compensate("share insert", ns, &e, move |s| s.delete_share(ns, share_id).map(drop))
                    .await;
                return Err(e);
            }
        };

        self.counter_changed(ns, Counter::Shares, share_count);
        Ok(ShareOutcome {
            share_count,
            url: self.share_url(ns),
        })
    }

    /// Views are a bare counter on original content; reposts have none.
    pub async fn record_view(&self, ns: Namespace) -> Result<u64> {
        if ns.kind.is_repost() {
            return Err(EngagementError::Invalid(format!("{} has no view counter", ns.kind)));
        }
        self.owner(ns).await?;

        let view_count = self
            .remote
            .call("increment_count", move |s| s.increment_count(ns, Counter::Views))
            .await?;
        self.counter_changed(ns, Counter::Views, view_count);
        Ok(view_count)
    }

    pub(crate) fn counter_changed(&self, namespace: Namespace, counter: Counter, value: u64) {
        self.live.publish(LiveEvent::CounterChanged {
            namespace,
            counter,
            value,
        });
    }

    /// Undoes a row write whose counter update failed. A failed undo leaves
    /// the counter out of step with its rows until reconciliation.
    ///
    /// A timed-out counter call is abandoned, not cancelled: it can still
    /// commit after the timeout fires. Undoing the row then would leave the
    /// counter ahead of the rows, so the row is kept and any drift is left to
    /// the reconciler.
    pub(crate) async fn compensate<F>(
        &self,
        what: &'static str,
        ns: Namespace,
        cause: &EngagementError,
        undo: F,
    ) where
        F: FnOnce(&dyn Store) -> StoreResult<()> + Send + 'static,
    {
        if matches!(cause, EngagementError::Timeout { .. }) {
            warn!("Counter update on {} timed out and may still land; keeping {}", ns, what);
            return;
        }
        warn!("Counter update failed on {}; undoing {}", ns, what);
        if let Err(e) = self.remote.call("compensate", undo).await {
            error!("Failed to undo {} on {}: {}; counters need reconciliation", what, ns, e);
        }
    }
}

fn validate_comment(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EngagementError::Invalid("comment is empty".into()));
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(EngagementError::Invalid(format!(
            "comment exceeds {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(text.to_string())
}
