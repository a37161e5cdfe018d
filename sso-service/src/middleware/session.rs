use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    services::{ServiceError, SessionClaims},
    AppState,
};

/// Requires a valid `Authorization: Bearer <sso_session_token>` whose user
/// can still log in. Blocking or deleting a user ends their sessions.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ServiceError::InvalidSession)?;

    let claims = state.jwt.validate_session_token(token)?;
    let user_id = claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| ServiceError::InvalidSession)?;

    match state.users.get(user_id).await {
        Ok(user) if user.can_login() => {}
        Ok(_) | Err(ServiceError::UserNotFound) => return Err(ServiceError::InvalidSession.into()),
        Err(e) => return Err(e.into()),
    }

    // Handlers read the claims through `SessionUser`
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// The signed-in user behind the current request.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub claims: SessionClaims,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<SessionClaims>()
            .cloned()
            .ok_or(ServiceError::InvalidSession)?;

        let user_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| ServiceError::InvalidSession)?;

        Ok(SessionUser { user_id, claims })
    }
}
