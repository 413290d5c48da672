use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use marquee_engagement::Session;
use marquee_types::api::UnrepostResponse;

use crate::{ApiError, AppState, base_kind};

#[derive(Debug, Deserialize)]
pub struct RepostQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// 201 for a new repost, 200 when the caller had already reposted.
pub async fn create_repost(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = base_kind(&kind)?;
    let outcome = state
        .engagement
        .reposts
        .create_repost(&session, kind, id)
        .await?;

    let status = if outcome.already_reposted {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

pub async fn delete_repost(
    State(state): State<AppState>,
    Path((kind, repost_id)): Path<(String, Uuid)>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = base_kind(&kind)?;
    let repost_count = state
        .engagement
        .reposts
        .delete_repost(&session, kind, repost_id)
        .await?;
    Ok(Json(UnrepostResponse { repost_count }))
}

pub async fn list_reposts(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<RepostQuery>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = base_kind(&kind)?;
    let cards = state
        .engagement
        .reposts
        .load_reposts(session.user_id(), kind, query.limit.min(200))
        .await?;
    Ok(Json(cards))
}
