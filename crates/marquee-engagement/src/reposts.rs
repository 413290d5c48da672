use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use marquee_types::api::RepostOutcome;
use marquee_types::events::LiveEvent;
use marquee_types::models::{ContentStatus, Counters, Profile, Repost, RepostCard};
use marquee_types::{BaseKind, Counter, Namespace};

use crate::client::EngagementClient;
use crate::error::{EngagementError, Result};
use crate::loaders::content_cards;
use crate::session::Session;

/// Creates and destroys repost wrappers, keeping the original item's
/// `repost_count` in step. Each repost owns a separate engagement namespace
/// (`{kind}_repost`).
#[derive(Clone)]
pub struct RepostManager {
    client: EngagementClient,
}

impl RepostManager {
    pub fn new(client: EngagementClient) -> Self {
        Self { client }
    }

    /// Idempotent: a second call for the same `(user, content)` returns the
    /// existing repost with `already_reposted` set and changes nothing.
    pub async fn create_repost(
        &self,
        session: &Session,
        kind: BaseKind,
        content_id: Uuid,
    ) -> Result<RepostOutcome> {
        let user_id = session.require_user()?;
        let original = Namespace::new(kind.kind(), content_id);
        let remote = self.client.remote();

        self.client.owner(original).await?;

        let existing = remote
            .call("find_repost", move |s| s.find_repost(kind, user_id, content_id))
            .await?;
        if let Some(repost) = existing {
            return self.already_reposted(repost).await;
        }

        let repost = Repost {
            id: Uuid::new_v4(),
            base: kind,
            user_id,
            content_id,
            counters: Counters::default(),
            created_at: Utc::now(),
        };

        let record = repost.clone();
        match remote.call("insert_repost", move |s| s.insert_repost(&record)).await {
            Ok(()) => {}
            Err(EngagementError::Conflict(detail)) => {
                debug!("Repost of {} by {} raced another insert: {}", original, user_id, detail);
                let winner = remote
                    .call("find_repost", move |s| s.find_repost(kind, user_id, content_id))
                    .await?
                    .ok_or(EngagementError::Conflict(detail))?;
                return self.already_reposted(winner).await;
            }
            Err(e) => return Err(e),
        }

        let repost_count = match remote
            .call("increment_count", move |s| s.increment_count(original, Counter::Reposts))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                let repost_id = repost.id;
                self.client
                    .compensate("repost insert", original, &e, move |s| {
                        s.delete_repost(kind, repost_id).map(drop)
                    })
                    .await;
                return Err(e);
            }
        };

        info!("{} reposted {} as {}", user_id, original, repost.id);
        self.client.counter_changed(original, Counter::Reposts, repost_count);
        self.client.live().publish(LiveEvent::RepostCreated {
            namespace: repost.namespace(),
            original,
            user_id,
        });

        Ok(RepostOutcome {
            repost,
            already_reposted: false,
            repost_count,
        })
    }

    async fn already_reposted(&self, repost: Repost) -> Result<RepostOutcome> {
        let counters = self.client.counters(repost.original()).await?;
        Ok(RepostOutcome {
            repost,
            already_reposted: true,
            repost_count: counters.repost_count,
        })
    }

    /// Only the reposting user may undo a repost. The repost's own likes,
    /// comments and shares are deleted with it. Returns the original item's
    /// new `repost_count`.
    pub async fn delete_repost(
        &self,
        session: &Session,
        kind: BaseKind,
        repost_id: Uuid,
    ) -> Result<u64> {
        let user_id = session.require_user()?;
        let remote = self.client.remote();

        let repost = self.get_repost(kind, repost_id).await?;
        if repost.user_id != user_id {
            return Err(EngagementError::Forbidden("undo this repost"));
        }

        let deleted = remote
            .call("delete_repost", move |s| s.delete_repost(kind, repost_id))
            .await?;
        if !deleted {
            return Err(EngagementError::not_found(format!("repost {}", repost_id)));
        }

        let original = repost.original();
        let repost_count = remote
            .call("decrement_count", move |s| s.decrement_count(original, Counter::Reposts))
            .await
            .inspect_err(|e| {
                // The repost and its namespace are gone; restoring them is
                // not possible, so only reconciliation can fix the count.
                error!(
                    "Repost {} deleted but {} repost_count not decremented: {}",
                    repost_id, original, e
                );
            })?;

        info!("{} removed repost {} of {}", user_id, repost_id, original);
        self.client.counter_changed(original, Counter::Reposts, repost_count);
        self.client.live().publish(LiveEvent::RepostDeleted {
            namespace: repost.namespace(),
            original,
        });

        Ok(repost_count)
    }

    pub async fn get_repost(&self, kind: BaseKind, repost_id: Uuid) -> Result<Repost> {
        self.client
            .remote()
            .call("get_repost", move |s| s.get_repost(kind, repost_id))
            .await?
            .ok_or_else(|| EngagementError::not_found(format!("repost {}", repost_id)))
    }

    pub async fn find_repost(
        &self,
        kind: BaseKind,
        user_id: Uuid,
        content_id: Uuid,
    ) -> Result<Option<Repost>> {
        self.client
            .remote()
            .call("find_repost", move |s| s.find_repost(kind, user_id, content_id))
            .await
    }

    /// Newest-first reposts of one kind as viewer cards, each embedding the
    /// original item. Reposts whose original is no longer published are
    /// skipped.
    pub async fn load_reposts(
        &self,
        viewer: Option<Uuid>,
        kind: BaseKind,
        limit: u32,
    ) -> Result<Vec<RepostCard>> {
        let remote = self.client.remote();
        let reposts = remote
            .call("list_reposts", move |s| s.list_reposts(kind, limit))
            .await?;
        if reposts.is_empty() {
            return Ok(vec![]);
        }

        let original_ids: Vec<Uuid> = unique(reposts.iter().map(|r| r.content_id));
        let reposter_ids: Vec<Uuid> = unique(reposts.iter().map(|r| r.user_id));
        let repost_ids: Vec<Uuid> = reposts.iter().map(|r| r.id).collect();

        let originals = remote
            .call("get_contents", move |s| s.get_contents(kind, &original_ids))
            .await?;
        let originals: HashMap<Uuid, _> = content_cards(&self.client, kind, viewer, originals)
            .await?
            .into_iter()
            .filter(|card| card.item.status == ContentStatus::Published)
            .map(|card| (card.item.id, card))
            .collect();

        let profiles = remote
            .call("profiles", move |s| s.profiles(&reposter_ids))
            .await?;
        let liked = self
            .client
            .liked_among(kind.repost_kind(), viewer, repost_ids)
            .await?;

        let cards: Vec<RepostCard> = reposts
            .into_iter()
            .filter_map(|repost| {
                let Some(original) = originals.get(&repost.content_id).cloned() else {
                    debug!("Skipping repost {}: original {} unavailable", repost.id, repost.content_id);
                    return None;
                };
                let reposter = profiles
                    .get(&repost.user_id)
                    .cloned()
                    .unwrap_or_else(|| Profile::unknown(repost.user_id));
                Some(RepostCard {
                    is_liked: liked.contains(&repost.id),
                    repost,
                    reposter,
                    original,
                })
            })
            .collect();

        debug!("Loaded {} {} reposts", cards.len(), kind);
        Ok(cards)
    }
}

fn unique(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
