use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::namespace::{BaseKind, ContentKind, Counter, Namespace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Published,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

/// Kind-specific payload of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBody {
    Scene { title: String, description: String },
    Monologue { title: String, content: String },
    Character { name: String, description: String },
    Frame { image_url: String, caption: String },
}

impl ContentBody {
    pub fn kind(&self) -> BaseKind {
        match self {
            Self::Scene { .. } => BaseKind::Scene,
            Self::Monologue { .. } => BaseKind::Monologue,
            Self::Character { .. } => BaseKind::Character,
            Self::Frame { .. } => BaseKind::Frame,
        }
    }

    /// The two kind-specific text columns, in storage order.
    pub fn fields(&self) -> (&str, &str) {
        match self {
            Self::Scene { title, description } => (title, description),
            Self::Monologue { title, content } => (title, content),
            Self::Character { name, description } => (name, description),
            Self::Frame { image_url, caption } => (image_url, caption),
        }
    }

    pub fn from_fields(kind: BaseKind, first: String, second: String) -> Self {
        match kind {
            BaseKind::Scene => Self::Scene { title: first, description: second },
            BaseKind::Monologue => Self::Monologue { title: first, content: second },
            BaseKind::Character => Self::Character { name: first, description: second },
            BaseKind::Frame => Self::Frame { image_url: first, caption: second },
        }
    }
}

/// Denormalized counters stored on a parent row. Reposts always report zero
/// `repost_count` and `view_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub repost_count: u64,
    pub view_count: u64,
}

impl Counters {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Likes => self.like_count,
            Counter::Comments => self.comment_count,
            Counter::Shares => self.share_count,
            Counter::Reposts => self.repost_count,
            Counter::Views => self.view_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub status: ContentStatus,
    pub body: ContentBody,
    pub counters: Counters,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn kind(&self) -> BaseKind {
        self.body.kind()
    }

    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.kind().kind(), self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Placeholder for authors whose profile row is missing.
    pub fn unknown(user_id: Uuid) -> Self {
        Self {
            user_id,
            username: "unknown".to_string(),
            display_name: None,
            avatar_url: None,
        }
    }
}

/// A content item joined with its author's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoredContent {
    pub item: ContentItem,
    pub author: Profile,
}

/// A user's repost of one content item. It has its own engagement namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repost {
    pub id: Uuid,
    pub base: BaseKind,
    pub user_id: Uuid,
    pub content_id: Uuid,
    pub counters: Counters,
    pub created_at: DateTime<Utc>,
}

impl Repost {
    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.base.repost_kind(), self.id)
    }

    /// Namespace of the original item this repost wraps.
    pub fn original(&self) -> Namespace {
        Namespace::new(self.base.kind(), self.content_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub namespace: Namespace,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub namespace: Namespace,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub namespace: Namespace,
    pub created_at: DateTime<Utc>,
}

// -- Feed cards --

/// A published item as a viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCard {
    pub item: ContentItem,
    pub author: Profile,
    pub is_liked: bool,
    pub is_reposted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepostCard {
    pub repost: Repost,
    pub reposter: Profile,
    pub original: ContentCard,
    /// Whether the viewer liked the repost itself, not the original.
    pub is_liked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedData {
    Content(ContentCard),
    Repost(RepostCard),
}

/// One tagged item of the merged home feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub data: FeedData,
    pub created_at: DateTime<Utc>,
}

impl FeedEntry {
    pub fn content(card: ContentCard) -> Self {
        Self {
            kind: card.item.kind().kind(),
            created_at: card.item.created_at,
            data: FeedData::Content(card),
        }
    }

    pub fn repost(card: RepostCard) -> Self {
        Self {
            kind: card.repost.base.repost_kind(),
            created_at: card.repost.created_at,
            data: FeedData::Repost(card),
        }
    }

    pub fn id(&self) -> Uuid {
        match &self.data {
            FeedData::Content(card) => card.item.id,
            FeedData::Repost(card) => card.repost.id,
        }
    }
}
