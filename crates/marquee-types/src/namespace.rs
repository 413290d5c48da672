use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four kinds of creative content a user can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseKind {
    Scene,
    Monologue,
    Character,
    Frame,
}

impl BaseKind {
    pub const ALL: [BaseKind; 4] = [
        BaseKind::Scene,
        BaseKind::Monologue,
        BaseKind::Character,
        BaseKind::Frame,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Monologue => "monologue",
            Self::Character => "character",
            Self::Frame => "frame",
        }
    }

    /// The engagement kind of the content item itself.
    pub fn kind(self) -> ContentKind {
        match self {
            Self::Scene => ContentKind::Scene,
            Self::Monologue => ContentKind::Monologue,
            Self::Character => ContentKind::Character,
            Self::Frame => ContentKind::Frame,
        }
    }

    /// The engagement kind of a repost wrapping this kind of content.
    pub fn repost_kind(self) -> ContentKind {
        match self {
            Self::Scene => ContentKind::SceneRepost,
            Self::Monologue => ContentKind::MonologueRepost,
            Self::Character => ContentKind::CharacterRepost,
            Self::Frame => ContentKind::FrameRepost,
        }
    }

    /// Table holding the content rows (`scenes`, `frames`, ...).
    pub fn content_table(self) -> &'static str {
        self.kind().route().parent_table
    }

    /// Table holding repost wrappers of this kind (`scene_reposts`, ...).
    pub fn reposts_table(self) -> &'static str {
        self.repost_kind().route().parent_table
    }

    /// Column in a repost table that points at the original content.
    pub fn content_id_column(self) -> &'static str {
        self.kind().route().id_column
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the eight engagement namespaces kinds: four base kinds plus their
/// repost wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Scene,
    Monologue,
    Character,
    Frame,
    SceneRepost,
    MonologueRepost,
    CharacterRepost,
    FrameRepost,
}

/// Physical storage location of one content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Prefix shared by the interaction tables (`scene`, `frame_repost`).
    pub interaction_prefix: &'static str,
    pub likes_table: &'static str,
    pub comments_table: &'static str,
    pub shares_table: &'static str,
    /// Column in the interaction tables referencing the parent row.
    pub id_column: &'static str,
    /// Table holding the parent row and its denormalized counters.
    pub parent_table: &'static str,
}

impl Route {
    pub fn table(&self, interaction: Interaction) -> &'static str {
        match interaction {
            Interaction::Like => self.likes_table,
            Interaction::Comment => self.comments_table,
            Interaction::Share => self.shares_table,
        }
    }
}

macro_rules! route {
    (base $base:literal) => {
        Route {
            interaction_prefix: $base,
            likes_table: concat!($base, "_likes"),
            comments_table: concat!($base, "_comments"),
            shares_table: concat!($base, "_shares"),
            id_column: concat!($base, "_id"),
            parent_table: concat!($base, "s"),
        }
    };
    (repost $base:literal) => {
        Route {
            interaction_prefix: concat!($base, "_repost"),
            likes_table: concat!($base, "_repost_likes"),
            comments_table: concat!($base, "_repost_comments"),
            shares_table: concat!($base, "_repost_shares"),
            id_column: "repost_id",
            parent_table: concat!($base, "_reposts"),
        }
    };
}

// Indexed by `ContentKind as usize`.
static ROUTES: [Route; 8] = [
    route!(base "scene"),
    route!(base "monologue"),
    route!(base "character"),
    route!(base "frame"),
    route!(repost "scene"),
    route!(repost "monologue"),
    route!(repost "character"),
    route!(repost "frame"),
];

impl ContentKind {
    pub const ALL: [ContentKind; 8] = [
        ContentKind::Scene,
        ContentKind::Monologue,
        ContentKind::Character,
        ContentKind::Frame,
        ContentKind::SceneRepost,
        ContentKind::MonologueRepost,
        ContentKind::CharacterRepost,
        ContentKind::FrameRepost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Monologue => "monologue",
            Self::Character => "character",
            Self::Frame => "frame",
            Self::SceneRepost => "scene_repost",
            Self::MonologueRepost => "monologue_repost",
            Self::CharacterRepost => "character_repost",
            Self::FrameRepost => "frame_repost",
        }
    }

    pub fn is_repost(self) -> bool {
        matches!(
            self,
            Self::SceneRepost | Self::MonologueRepost | Self::CharacterRepost | Self::FrameRepost
        )
    }

    pub fn base(self) -> BaseKind {
        match self {
            Self::Scene | Self::SceneRepost => BaseKind::Scene,
            Self::Monologue | Self::MonologueRepost => BaseKind::Monologue,
            Self::Character | Self::CharacterRepost => BaseKind::Character,
            Self::Frame | Self::FrameRepost => BaseKind::Frame,
        }
    }

    /// Resolve the kind to its storage route.
    pub fn route(self) -> &'static Route {
        &ROUTES[self as usize]
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown content kind: {0:?}")]
pub struct UnknownContentKind(pub String);

impl FromStr for ContentKind {
    type Err = UnknownContentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownContentKind(s.to_string()))
    }
}

impl FromStr for BaseKind {
    type Err = UnknownContentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownContentKind(s.to_string()))
    }
}

/// The three row-backed interactions of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Like,
    Comment,
    Share,
}

impl Interaction {
    pub const ALL: [Interaction; 3] = [Interaction::Like, Interaction::Comment, Interaction::Share];

    pub fn counter(self) -> Counter {
        match self {
            Self::Like => Counter::Likes,
            Self::Comment => Counter::Comments,
            Self::Share => Counter::Shares,
        }
    }
}

/// Denormalized counter columns on a parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Likes,
    Comments,
    Shares,
    Reposts,
    Views,
}

impl Counter {
    pub fn column(self) -> &'static str {
        match self {
            Self::Likes => "like_count",
            Self::Comments => "comment_count",
            Self::Shares => "share_count",
            Self::Reposts => "repost_count",
            Self::Views => "view_count",
        }
    }

    /// Reposts carry only like/comment/share counters.
    pub fn applies_to(self, kind: ContentKind) -> bool {
        !kind.is_repost() || matches!(self, Self::Likes | Self::Comments | Self::Shares)
    }
}

/// Key of an engagement namespace: the entity (original or repost) whose
/// likes, comments and shares are tracked together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub kind: ContentKind,
    pub id: Uuid,
}

impl Namespace {
    pub fn new(kind: ContentKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn route(&self) -> &'static Route {
        self.kind.route()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
