use chrono::Utc;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use sso_service::{
    build_router,
    config::SsoConfig,
    db,
    services::{
        AuthCodeStore, Database, IdTokenVerifier, InMemoryAuthCodeStore, InMemoryClientDirectory,
        InMemoryConsentStore, InMemoryKeyStore, InMemoryUserStore, KeyManager, OidcVerifier,
        RedisAuthCodeStore, ServiceError, SigningKey,
    },
    utils::Argon2Hasher,
    AppState, Stores,
};

const AUTH_CODE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = SsoConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        environment = ?config.environment,
        issuer = %config.issuer,
        "Starting SSO service"
    );

    let hasher = Arc::new(
        Argon2Hasher::new(
            config.password_hash.memory_kib,
            config.password_hash.iterations,
        )
        .map_err(service_core::error::AppError::from)?,
    );

    let federation = config.federation.as_ref().map(|federation| {
        tracing::info!(issuer = %federation.issuer, "Federated login enabled");
        Arc::new(OidcVerifier::new(federation)) as Arc<dyn IdTokenVerifier>
    });
    let memory_codes = Arc::new(InMemoryAuthCodeStore::new());

    let (stores, pool) = match &config.database {
        Some(db_config) => {
            let pool = db::create_pool(db_config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
            let database = Arc::new(Database::new(pool.clone()));

            for registration in &config.clients {
                if database
                    .register_client(&registration.to_client(), &registration.scopes)
                    .await?
                {
                    tracing::info!(client_id = %registration.client_id, "Client registered");
                }
            }

            let stores = Stores {
                users: database.clone(),
                clients: database.clone(),
                consents: database.clone(),
                auth_codes: memory_codes.clone(),
                keys: database,
                hasher,
                federation,
            };
            (stores, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            let clients = Arc::new(InMemoryClientDirectory::new());
            let consents = Arc::new(InMemoryConsentStore::new());
            for registration in &config.clients {
                clients.register(registration.to_client());
                consents.set_client_scopes(&registration.client_id, registration.scopes.clone());
                tracing::info!(client_id = %registration.client_id, "Client registered");
            }

            let stores = Stores {
                users: Arc::new(InMemoryUserStore::new()),
                clients,
                consents,
                auth_codes: memory_codes.clone(),
                keys: Arc::new(InMemoryKeyStore::new()),
                hasher,
                federation,
            };
            (stores, None)
        }
    };

    let redis = match &config.redis {
        Some(redis_config) => Some(RedisAuthCodeStore::new(&redis_config.url).await?),
        None => None,
    };
    let stores = match &redis {
        Some(redis) => Stores {
            auth_codes: Arc::new(redis.clone()) as Arc<dyn AuthCodeStore>,
            ..stores
        },
        None => {
            spawn_auth_code_purge(memory_codes);
            stores
        }
    };

    let mut state = AppState::new(config.clone(), stores);
    state.pool = pool;
    state.redis = redis;

    provision_signing_key(&config, &state.keys).await?;

    let app = build_router(state);

    let addr: SocketAddr = config
        .common
        .listen_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Loads the configured PEM into the key store, or generates a key outside
/// production when the store is empty.
async fn provision_signing_key(
    config: &SsoConfig,
    keys: &KeyManager,
) -> Result<(), ServiceError> {
    if let Some(path) = &config.signing_key.path {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read signing key from {}: {}", path, e))?;
        let key = SigningKey::from_pem(&config.signing_key.name, &pem, Utc::now())?;
        keys.save_key(&key).await?;
    }

    match keys.active_key().await {
        Ok(key) => {
            tracing::info!(kid = %key.kid, name = %key.name, "Active signing key");
            Ok(())
        }
        Err(ServiceError::KeysNotFound) if !config.is_prod() => {
            tracing::warn!("No signing key configured, generating one");
            let key = SigningKey::generate(&config.signing_key.name)?;
            keys.save_key(&key).await
        }
        Err(e) => Err(e),
    }
}

/// In-memory codes that are never exchanged would otherwise stay forever.
fn spawn_auth_code_purge(store: Arc<InMemoryAuthCodeStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(AUTH_CODE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Expired authorization codes purged");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
