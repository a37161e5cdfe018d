//! The signed-in user's own account.

use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

use crate::dtos::user::UpdateUserRequest;
use crate::middleware::SessionUser;
use crate::models::User;
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn get_me(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get(session.user_id).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    session: SessionUser,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .update(session.user_id, &req.name, &req.email)
        .await?;
    Ok(Json(user))
}

pub async fn delete_me(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<StatusCode, AppError> {
    state.users.delete(session.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
