use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use marquee_engagement::Session;

use crate::{ApiError, AppState, base_kind};

/// Newest-first published items of one kind with the caller's flags.
pub async fn list_content(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = base_kind(&kind)?;
    let cards = state
        .engagement
        .loaders
        .get(kind)
        .load(session.user_id())
        .await?;
    Ok(Json(cards))
}

pub async fn delete_content(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = base_kind(&kind)?;
    state.engagement.loaders.get(kind).delete(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
