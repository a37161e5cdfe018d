use crate::AppState;
use axum::{extract::State, http::header, response::IntoResponse, Json};
use service_core::error::AppError;

/// Public JSON Web Key Set. Unauthenticated.
pub async fn jwks(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let jwks = state.oauth.jwks().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(jwks),
    ))
}
