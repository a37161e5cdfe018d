pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

use chrono::Duration;
use service_core::axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use sqlx::PgPool;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::SsoConfig;
use crate::services::{
    AuthCodeStore, AuthService, ClientDirectory, ConsentStore, IdTokenVerifier, IdentityResolver,
    JwtService, KeyManager, KeyStore, OAuthService, RedisAuthCodeStore, UserRepository,
    UserService,
};
use crate::utils::CredentialHasher;

/// Capability implementations the services are built over.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepository>,
    pub clients: Arc<dyn ClientDirectory>,
    pub consents: Arc<dyn ConsentStore>,
    pub auth_codes: Arc<dyn AuthCodeStore>,
    pub keys: Arc<dyn KeyStore>,
    pub hasher: Arc<dyn CredentialHasher>,
    /// Upstream ID token verification; `None` disables federated login.
    pub federation: Option<Arc<dyn IdTokenVerifier>>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: SsoConfig,
    pub jwt: JwtService,
    pub keys: Arc<KeyManager>,
    pub auth: AuthService,
    pub oauth: OAuthService,
    pub users: UserService,
    /// Set when running over Postgres; checked by `/health`.
    pub pool: Option<PgPool>,
    /// Set when auth codes live in Redis; checked by `/health`.
    pub redis: Option<RedisAuthCodeStore>,
}

impl AppState {
    pub fn new(config: SsoConfig, stores: Stores) -> Self {
        let jwt = JwtService::new(
            config.session.secret.expose_secret(),
            &config.issuer,
            config.session.ttl_seconds,
            config.tokens.access_token_ttl_seconds,
            config.tokens.refresh_token_ttl_seconds,
        );
        let keys = Arc::new(KeyManager::new(stores.keys));

        let resolver = IdentityResolver::new(stores.users.clone(), stores.hasher, &config.issuer);
        let auth = AuthService::new(resolver, jwt.clone(), stores.federation);
        let oauth = OAuthService::new(
            stores.clients,
            stores.consents,
            stores.auth_codes,
            keys.clone(),
            jwt.clone(),
            Duration::seconds(config.tokens.auth_code_ttl_seconds),
        );
        let users = UserService::new(stores.users);

        Self {
            config,
            jwt,
            keys,
            auth,
            oauth,
            users,
            pool: None,
            redis: None,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route("/oauth/authorize", get(handlers::oauth::authorize))
        .route("/oauth/consent", post(handlers::oauth::consent))
        .route("/oauth/token", post(handlers::oauth::token))
        .route(
            "/users/me",
            get(handlers::user::get_me)
                .put(handlers::user::update_me)
                .delete(handlers::user::delete_me),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/.well-known/jwks.json", get(handlers::well_known::jwks))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .merge(session_routes)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(service_core::middleware::REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(pool) = &state.pool {
        db::health_check(pool).await.map_err(|e| {
            tracing::error!(error = %e, "PostgreSQL health check failed");
            AppError::InternalError(anyhow::anyhow!("PostgreSQL unavailable"))
        })?;
    }

    if let Some(redis) = &state.redis {
        redis.health_check().await.map_err(|e| {
            tracing::error!(error = %e, "Redis health check failed");
            AppError::InternalError(e)
        })?;
    }

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": if state.pool.is_some() { "up" } else { "disabled" },
            "redis": if state.redis.is_some() { "up" } else { "disabled" },
        }
    })))
}
