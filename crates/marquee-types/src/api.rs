use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CommentRecord, FeedEntry, Repost};

// -- JWT Claims --

/// Bearer token claims. Tokens are issued by the identity service; this
/// server only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Likes --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub like_count: u64,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCommentRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment: CommentRecord,
    pub comment_count: u64,
}

// -- Shares and views --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareOutcome {
    pub share_count: u64,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub view_count: u64,
}

// -- Reposts --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepostOutcome {
    pub repost: Repost,
    pub already_reposted: bool,
    pub repost_count: u64,
}

#[derive(Debug, Serialize)]
pub struct UnrepostResponse {
    pub repost_count: u64,
}

// -- Feed --

#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub items: Vec<FeedEntry>,
    pub visible_count: usize,
    pub total: usize,
}
