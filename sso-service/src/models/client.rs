//! Registered OAuth2 client (relying party).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use subtle::ConstantTimeEq;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Active,
    Disabled,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Disabled => "disabled",
        }
    }
}

impl TryFrom<String> for ClientStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(ClientStatus::Active),
            "disabled" => Ok(ClientStatus::Disabled),
            _ => Err(format!("Invalid client status: {}", value)),
        }
    }
}

/// Client registration. Only `status` changes after creation.
#[derive(Debug, Clone, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub client_id: String,
    /// SHA-256 of the secret; `None` for public clients.
    pub client_secret_hash: Option<String>,
    pub name: String,
    pub redirect_uris: Vec<String>,
    #[sqlx(try_from = "String")]
    pub status: ClientStatus,
    pub created_utc: DateTime<Utc>,
}

impl Client {
    pub fn new(
        client_id: String,
        client_secret: Option<&str>,
        name: String,
        redirect_uris: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            client_secret_hash: client_secret.map(Self::hash_secret),
            name,
            redirect_uris,
            status: ClientStatus::Active,
            created_utc: Utc::now(),
        }
    }

    pub fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Active
    }

    /// Byte-exact membership in the whitelist; callers normalize beforehand.
    pub fn allows_redirect(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Confidential clients must present their secret; public clients must not
    /// present one.
    pub fn verify_secret(&self, supplied: Option<&str>) -> bool {
        match (&self.client_secret_hash, supplied) {
            (Some(stored), Some(secret)) => {
                let supplied_hash = Self::hash_secret(secret);
                stored.as_bytes().ct_eq(supplied_hash.as_bytes()).into()
            }
            (None, None) => true,
            (None, Some(secret)) => secret.is_empty(),
            (Some(_), None) => false,
        }
    }
}
