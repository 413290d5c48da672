//! HTTP surface of the engagement core.

pub mod content;
pub mod error;
pub mod feed;
pub mod interactions;
pub mod live;
pub mod middleware;
pub mod reposts;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use uuid::Uuid;

use marquee_engagement::{Engagement, EngagementError};
use marquee_types::{BaseKind, ContentKind, Namespace};

pub use error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engagement: Engagement,
    pub jwt_secret: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/feed", get(feed::get_feed))
        .route("/live", get(live::live_upgrade))
        .route("/content/{kind}", get(content::list_content))
        .route("/content/{kind}/{id}", delete(content::delete_content))
        .route("/content/{kind}/{id}/like", post(interactions::toggle_like))
        .route(
            "/content/{kind}/{id}/comments",
            get(interactions::list_comments).post(interactions::add_comment),
        )
        .route(
            "/content/{kind}/{id}/comments/{comment_id}",
            delete(interactions::delete_comment),
        )
        .route("/content/{kind}/{id}/share", post(interactions::share))
        .route("/content/{kind}/{id}/view", post(interactions::record_view))
        .route("/content/{kind}/{id}/reconcile", post(interactions::reconcile))
        .route("/content/{kind}/{id}/repost", post(reposts::create_repost))
        .route("/reposts/{kind}", get(reposts::list_reposts))
        .route("/reposts/{kind}/{repost_id}", delete(reposts::delete_repost))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::identify,
        ))
        .with_state(state)
}

/// Namespace from a `{kind}/{id}` path. Unknown kinds are a 400.
pub(crate) fn namespace(kind: &str, id: Uuid) -> Result<Namespace, ApiError> {
    let kind: ContentKind = kind
        .parse::<ContentKind>()
        .map_err(|e| EngagementError::Invalid(e.to_string()))?;
    Ok(Namespace::new(kind, id))
}

pub(crate) fn base_kind(kind: &str) -> Result<BaseKind, ApiError> {
    Ok(kind
        .parse::<BaseKind>()
        .map_err(|e| EngagementError::Invalid(e.to_string()))?)
}
