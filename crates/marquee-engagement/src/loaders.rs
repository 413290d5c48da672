use std::collections::HashSet;

use tracing::{debug, info};
use uuid::Uuid;

use marquee_types::models::{AuthoredContent, ContentCard};
use marquee_types::{BaseKind, Namespace};

use crate::client::EngagementClient;
use crate::error::{EngagementError, Result};
use crate::session::Session;

/// Fetches published content of one kind, newest first, as viewer cards.
#[derive(Clone)]
pub struct ContentLoader {
    kind: BaseKind,
    client: EngagementClient,
    limit: u32,
}

impl ContentLoader {
    pub fn new(kind: BaseKind, client: EngagementClient, limit: u32) -> Self {
        Self {
            kind,
            client,
            limit,
        }
    }

    pub fn kind(&self) -> BaseKind {
        self.kind
    }

    pub async fn load(&self, viewer: Option<Uuid>) -> Result<Vec<ContentCard>> {
        let kind = self.kind;
        let limit = self.limit;
        let items = self
            .client
            .remote()
            .call("list_published", move |s| s.list_published(kind, limit))
            .await?;

        debug!("Loaded {} published {} items", items.len(), kind);
        content_cards(&self.client, kind, viewer, items).await
    }

    /// Owner-only. Interaction rows and reposts go with the item.
    pub async fn delete(&self, session: &Session, id: Uuid) -> Result<()> {
        let user_id = session.require_user()?;
        let ns = Namespace::new(self.kind.kind(), id);

        let owner_id = self.client.owner(ns).await?;
        if owner_id != user_id {
            return Err(EngagementError::Forbidden("delete this content"));
        }

        let kind = self.kind;
        let deleted = self
            .client
            .remote()
            .call("delete_content", move |s| s.delete_content(kind, id))
            .await?;
        if !deleted {
            return Err(EngagementError::not_found(ns));
        }

        info!("{} deleted {}", user_id, ns);
        Ok(())
    }
}

/// One loader per base kind, in feed group order.
#[derive(Clone)]
pub struct Loaders {
    loaders: [ContentLoader; 4],
}

impl Loaders {
    pub fn new(client: &EngagementClient, limit: u32) -> Self {
        Self {
            loaders: BaseKind::ALL.map(|kind| ContentLoader::new(kind, client.clone(), limit)),
        }
    }

    pub fn get(&self, kind: BaseKind) -> &ContentLoader {
        // ALL order matches construction
        &self.loaders[kind as usize]
    }
}

/// Attaches the viewer's like/repost flags with one batched query each.
pub(crate) async fn content_cards(
    client: &EngagementClient,
    kind: BaseKind,
    viewer: Option<Uuid>,
    items: Vec<AuthoredContent>,
) -> Result<Vec<ContentCard>> {
    let ids: Vec<Uuid> = items.iter().map(|c| c.item.id).collect();

    let liked = client.liked_among(kind.kind(), viewer, ids.clone()).await?;
    let reposted = match viewer {
        Some(user_id) if !ids.is_empty() => {
            client
                .remote()
                .call("reposted_ids", move |s| s.reposted_ids(kind, user_id, &ids))
                .await?
        }
        _ => HashSet::new(),
    };

    Ok(items
        .into_iter()
        .map(|AuthoredContent { item, author }| ContentCard {
            is_liked: liked.contains(&item.id),
            is_reposted: reposted.contains(&item.id),
            item,
            author,
        })
        .collect())
}
