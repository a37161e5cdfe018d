//! Postgres-backed stores for the identity graph, clients, consents and
//! signing keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{normalize_email, Client, Credential, Identity, User};
use crate::services::{
    ClientDirectory, ConsentStore, KeyStore, ServiceError, SigningKey, UserRepository,
};

const USER_COLUMNS: &str = "user_id, name, email, status, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Adds a client and its registered scopes. Clients are immutable once
    /// registered, so an existing `client_id` is left untouched and `false`
    /// is returned.
    #[instrument(skip(self, client), fields(client_id = %client.client_id))]
    pub async fn register_client(
        &self,
        client: &Client,
        scopes: &[String],
    ) -> Result<bool, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO clients (id, client_id, client_secret_hash, name, redirect_uris, status, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (client_id) DO NOTHING
            "#,
        )
        .bind(client.id)
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&client.name)
        .bind(&client.redirect_uris)
        .bind(client.status.as_str())
        .bind(client.created_utc)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !inserted {
            return Ok(false);
        }

        for scope in scopes {
            sqlx::query("INSERT INTO client_scopes (client_id, scope) VALUES ($1, $2)")
                .bind(&client.client_id)
                .bind(scope)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl UserRepository for Database {
    async fn by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn by_identity(
        &self,
        identity_type: &str,
        external_id: &str,
        issuer: &str,
    ) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.user_id, u.name, u.email, u.status, u.created_utc
            FROM users u
            JOIN identities i ON i.user_id = u.user_id
            WHERE i.identity_type = $1 AND i.external_id = $2 AND i.issuer = $3
            "#,
        )
        .bind(identity_type)
        .bind(external_id)
        .bind(issuer)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn identities(&self, user_id: Uuid) -> Result<Vec<Identity>, ServiceError> {
        let identities = sqlx::query_as::<_, Identity>(
            r#"
            SELECT identity_id, user_id, identity_type, external_id, issuer, created_utc
            FROM identities WHERE user_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(identities)
    }

    async fn credentials(&self, identity_id: Uuid) -> Result<Vec<Credential>, ServiceError> {
        let credentials = sqlx::query_as::<_, Credential>(
            r#"
            SELECT credential_id, identity_id, credential_type, secret, status,
                   created_utc, last_used_utc, expires_utc
            FROM credentials WHERE identity_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(credentials)
    }

    async fn create(&self, user: &User) -> Result<(), ServiceError> {
        insert_user(&self.pool, user).await
    }

    async fn update(&self, user: &User) -> Result<(), ServiceError> {
        let result =
            sqlx::query("UPDATE users SET name = $2, email = $3, status = $4 WHERE user_id = $1")
                .bind(user.user_id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(user.status.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }

    async fn save_identity(&self, identity: &Identity) -> Result<(), ServiceError> {
        insert_identity(&self.pool, identity).await
    }

    async fn save_credential(&self, credential: &Credential) -> Result<(), ServiceError> {
        insert_credential(&self.pool, credential).await
    }

    #[instrument(skip_all, fields(user_id = %user.user_id))]
    async fn register_user(
        &self,
        user: &User,
        identity: &Identity,
        credential: &Credential,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        insert_user(&mut *tx, user).await?;
        insert_identity(&mut *tx, identity).await?;
        insert_credential(&mut *tx, credential).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_user<'e, E>(executor: E, user: &User) -> Result<(), ServiceError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO users (user_id, name, email, status, created_utc) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user.user_id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(user.status.as_str())
    .bind(user.created_utc)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_identity<'e, E>(executor: E, identity: &Identity) -> Result<(), ServiceError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO identities (identity_id, user_id, identity_type, external_id, issuer, created_utc)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(identity.identity_id)
    .bind(identity.user_id)
    .bind(&identity.identity_type)
    .bind(&identity.external_id)
    .bind(&identity.issuer)
    .bind(identity.created_utc)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_credential<'e, E>(executor: E, credential: &Credential) -> Result<(), ServiceError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO credentials (credential_id, identity_id, credential_type, secret, status,
                                 created_utc, last_used_utc, expires_utc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(credential.credential_id)
    .bind(credential.identity_id)
    .bind(credential.credential_type.as_str())
    .bind(&credential.secret)
    .bind(credential.status.as_str())
    .bind(credential.created_utc)
    .bind(credential.last_used_utc)
    .bind(credential.expires_utc)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl ClientDirectory for Database {
    async fn by_id(&self, client_id: &str) -> Result<Option<Client>, ServiceError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, client_id, client_secret_hash, name, redirect_uris, status, created_utc
            FROM clients WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(client)
    }
}

#[async_trait]
impl ConsentStore for Database {
    async fn has_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> Result<bool, ServiceError> {
        let granted: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM consents
                WHERE user_id = $1 AND client_id = $2 AND scopes @> $3
            )
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .bind(scopes)
        .fetch_one(&self.pool)
        .await?;
        Ok(granted)
    }

    async fn save(
        &self,
        user_id: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO consents (user_id, client_id, scopes, created_utc)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, client_id) DO UPDATE
            SET scopes = ARRAY(
                SELECT DISTINCT s FROM unnest(consents.scopes || EXCLUDED.scopes) AS s ORDER BY s
            )
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .bind(scopes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn client_scopes(&self, client_id: &str) -> Result<Vec<String>, ServiceError> {
        let scopes: Vec<String> = sqlx::query_scalar(
            "SELECT scope FROM client_scopes WHERE client_id = $1 ORDER BY scope",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(scopes)
    }
}

#[async_trait]
impl KeyStore for Database {
    async fn get_private_keys(&self) -> Result<Vec<SigningKey>, ServiceError> {
        let rows = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT name, private_key_pem, created_at FROM signing_keys ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|(name, pem, created_at)| SigningKey::from_pem(name, pem, *created_at))
            .collect()
    }

    async fn save_private_key(&self, key: &SigningKey) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO signing_keys (kid, name, private_key_pem, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kid) DO NOTHING
            "#,
        )
        .bind(&key.kid)
        .bind(&key.name)
        .bind(key.to_pkcs8_pem()?)
        .bind(key.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
