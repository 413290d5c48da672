use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use marquee_engagement::EngagementError;

/// Handler error: an engagement failure rendered as a status code and a
/// JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError(pub EngagementError);

impl From<EngagementError> for ApiError {
    fn from(err: EngagementError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &EngagementError) -> StatusCode {
    match err {
        EngagementError::Unauthenticated => StatusCode::UNAUTHORIZED,
        EngagementError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngagementError::NotFound(_) => StatusCode::NOT_FOUND,
        EngagementError::Invalid(_) => StatusCode::BAD_REQUEST,
        EngagementError::Conflict(_) | EngagementError::Busy(_) => StatusCode::CONFLICT,
        EngagementError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        EngagementError::Remote(_) | EngagementError::PartialFeed { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(json!({
                "error": self.0.to_string(),
                "retryable": self.0.is_retryable(),
            })),
        )
            .into_response()
    }
}
