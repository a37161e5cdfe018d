//! Login and registration. The body's `provider` field selects the
//! authentication method.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::auth::{LoginRequest, RegisterRequest, SessionResponse};
use crate::models::{Credentials, Registration};
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let registration = Registration::try_from(req)?;
    let token = state.auth.register(registration).await?;
    Ok(Json(SessionResponse {
        sso_session_token: token,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let credentials = Credentials::try_from(req)?;
    let token = state.auth.login(credentials).await?;
    Ok(Json(SessionResponse {
        sso_session_token: token,
    }))
}
