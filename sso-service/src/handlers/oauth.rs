use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::oauth::{AuthorizeQuery, ConsentRequest, RedirectResponse, TokenRequest};
use crate::middleware::SessionUser;
use crate::services::{AuthorizeOutcome, ExchangeRequest, TokenResponse};
use crate::utils::ValidatedJson;
use crate::AppState;

/// `302` to the code redirect, or `200` with the consent view to render.
pub async fn authorize(
    State(state): State<AppState>,
    session: SessionUser,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, AppError> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Validation error: {}", e)))?;

    let outcome = state
        .oauth
        .authorize(
            session.user_id,
            &query.client_id,
            &query.redirect_uri,
            &query.scopes(),
        )
        .await?;

    Ok(match outcome {
        AuthorizeOutcome::Redirect { redirect_to } => {
            (StatusCode::FOUND, [(header::LOCATION, redirect_to)]).into_response()
        }
        AuthorizeOutcome::ConsentRequired(view) => (StatusCode::OK, Json(view)).into_response(),
    })
}

pub async fn consent(
    State(state): State<AppState>,
    session: SessionUser,
    ValidatedJson(req): ValidatedJson<ConsentRequest>,
) -> Result<Json<RedirectResponse>, AppError> {
    let redirect_to = if req.approve {
        state
            .oauth
            .grant_consent(
                session.user_id,
                &req.client_id,
                &req.redirect_uri,
                &req.scopes(),
            )
            .await?
    } else {
        state
            .oauth
            .deny_consent(session.user_id, &req.client_id, &req.redirect_uri)
            .await?
    };

    Ok(Json(RedirectResponse { redirect_to }))
}

pub async fn token(
    State(state): State<AppState>,
    session: SessionUser,
    ValidatedJson(req): ValidatedJson<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tokens: TokenResponse = state
        .oauth
        .exchange_code(ExchangeRequest {
            code: req.code,
            client_id: req.client_id,
            client_secret: req.client_secret,
            redirect_uri: req.redirect_uri,
            user_id: session.user_id,
        })
        .await?;

    Ok(([(header::CACHE_CONTROL, "no-store")], Json(tokens)))
}
