use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use marquee_engagement::Session;
use marquee_engagement::feed::PAGE_SIZE;
use marquee_types::api::FeedPage;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// How many merged entries the client has revealed so far.
    #[serde(default = "default_visible")]
    pub visible: usize,
}

fn default_visible() -> usize {
    PAGE_SIZE
}

/// Merged home feed truncated to the revealed count. Fails as a whole if
/// any source fails.
pub async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let mut entries = state.engagement.feed.load(session.user_id()).await?;
    let total = entries.len();
    entries.truncate(query.visible);

    Ok(Json(FeedPage {
        visible_count: entries.len(),
        total,
        items: entries,
    }))
}
