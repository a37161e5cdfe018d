use async_trait::async_trait;
use chrono::Duration;
use redis::{aio::ConnectionManager, Client};
use uuid::Uuid;

use crate::models::AuthCode;
use crate::services::{AuthCodeStore, ServiceError};

const AUTH_CODE_PREFIX: &str = "auth_code:";

/// Auth codes as JSON values under `auth_code:<code>`, expiring with the
/// code's TTL. `DEL` is the single-use primitive: its reply counts the keys
/// removed, so exactly one caller sees 1.
#[derive(Clone)]
pub struct RedisAuthCodeStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisAuthCodeStore {
    pub async fn new(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(url)?;

        // ConnectionManager reconnects on its own
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }

    pub async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

fn key(code: &str) -> String {
    format!("{}{}", AUTH_CODE_PREFIX, code)
}

#[async_trait]
impl AuthCodeStore for RedisAuthCodeStore {
    async fn issue(
        &self,
        client_id: &str,
        redirect_uri: &str,
        user_id: Uuid,
        scope: &str,
        ttl: Duration,
    ) -> Result<String, ServiceError> {
        let auth_code = AuthCode::new(client_id, redirect_uri, user_id, scope, ttl);
        let value = serde_json::to_string(&auth_code)
            .map_err(|e| anyhow::anyhow!("Failed to serialize auth code: {}", e))?;

        let mut conn = self.manager.clone();
        // EX must be positive; expiry itself is checked against issued_at.
        redis::cmd("SET")
            .arg(key(&auth_code.code))
            .arg(value)
            .arg("EX")
            .arg(ttl.num_seconds().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(auth_code.code)
    }

    async fn get(&self, code: &str) -> Result<Option<AuthCode>, ServiceError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key(code))
            .query_async(&mut conn)
            .await?;

        value
            .map(|v| {
                serde_json::from_str(&v)
                    .map_err(|e| anyhow::anyhow!("Corrupt auth code entry: {}", e).into())
            })
            .transpose()
    }

    async fn delete(&self, code: &str) -> Result<bool, ServiceError> {
        let mut conn = self.manager.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key(code))
            .query_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }
}
