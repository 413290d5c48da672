use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use marquee_engagement::Session;
use marquee_types::api::{AddCommentRequest, ViewResponse};

use crate::{ApiError, AppState, namespace};

pub async fn toggle_like(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let ns = namespace(&kind, id)?;
    let outcome = state.engagement.client.toggle_like(&session, ns).await?;
    Ok(Json(outcome))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let ns = namespace(&kind, id)?;
    let comments = state.engagement.client.list_comments(ns).await?;
    Ok(Json(comments))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Extension(session): Extension<Session>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ns = namespace(&kind, id)?;
    let response = state
        .engagement
        .client
        .add_comment(&session, ns, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path((kind, id, comment_id)): Path<(String, Uuid, Uuid)>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let ns = namespace(&kind, id)?;
    let comment_count = state
        .engagement
        .client
        .delete_comment(&session, ns, comment_id)
        .await?;
    Ok(Json(json!({ "comment_count": comment_count })))
}

pub async fn share(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let ns = namespace(&kind, id)?;
    let outcome = state.engagement.client.record_share(&session, ns).await?;
    Ok(Json(outcome))
}

/// Anonymous viewers count too.
pub async fn record_view(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let ns = namespace(&kind, id)?;
    let view_count = state.engagement.client.record_view(ns).await?;
    Ok(Json(ViewResponse { view_count }))
}

/// Recounts the namespace's counters from its rows.
pub async fn reconcile(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_user()?;
    let ns = namespace(&kind, id)?;
    let drifts = state.engagement.reconciler.reconcile(ns).await?;

    let repaired: Vec<_> = drifts
        .iter()
        .map(|d| json!({ "counter": d.counter, "stored": d.stored, "actual": d.actual }))
        .collect();
    Ok(Json(json!({ "repaired": repaired })))
}
