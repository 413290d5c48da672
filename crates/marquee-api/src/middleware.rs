use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use marquee_engagement::Session;
use marquee_types::api::Claims;

use crate::AppState;

/// Resolves the caller's [`Session`] from an optional bearer token. No
/// header means an anonymous session; a header that does not carry a valid
/// token is rejected.
pub async fn identify(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = match req.headers().get(header::AUTHORIZATION) {
        None => Session::anonymous(),
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or(StatusCode::UNAUTHORIZED)?;

            let token_data = decode::<Claims>(
                token,
                &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
                &Validation::default(),
            )
            .map_err(|e| {
                debug!("Rejected bearer token: {}", e);
                StatusCode::UNAUTHORIZED
            })?;

            Session::user(token_data.claims.sub)
        }
    };

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
