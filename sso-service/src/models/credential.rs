//! Credential model - secret material attached to an identity.
//! For password credentials `secret` is the Argon2 hash; for oauth credentials
//! it is the raw federated token, kept for audit/refresh and never verified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
    Password,
    OAuth,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::Password => "password",
            CredentialType::OAuth => "oauth",
        }
    }
}

impl TryFrom<String> for CredentialType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "password" => Ok(CredentialType::Password),
            "oauth" => Ok(CredentialType::OAuth),
            _ => Err(format!("Invalid credential type: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Revoked,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Revoked => "revoked",
        }
    }
}

impl TryFrom<String> for CredentialStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(CredentialStatus::Active),
            "revoked" => Ok(CredentialStatus::Revoked),
            _ => Err(format!("Invalid credential status: {}", value)),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    pub credential_id: Uuid,
    pub identity_id: Uuid,
    #[sqlx(try_from = "String")]
    pub credential_type: CredentialType,
    pub secret: String,
    #[sqlx(try_from = "String")]
    pub status: CredentialStatus,
    pub created_utc: DateTime<Utc>,
    pub last_used_utc: Option<DateTime<Utc>>,
    pub expires_utc: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new_password(identity_id: Uuid, password_hash: String) -> Self {
        Self::new(identity_id, CredentialType::Password, password_hash)
    }

    pub fn new_oauth(identity_id: Uuid, raw_token: String) -> Self {
        Self::new(identity_id, CredentialType::OAuth, raw_token)
    }

    fn new(identity_id: Uuid, credential_type: CredentialType, secret: String) -> Self {
        Self {
            credential_id: Uuid::new_v4(),
            identity_id,
            credential_type,
            secret,
            status: CredentialStatus::Active,
            created_utc: Utc::now(),
            last_used_utc: None,
            expires_utc: None,
        }
    }

    /// Active and not past its expiry, if it has one.
    pub fn is_usable(&self) -> bool {
        self.status == CredentialStatus::Active
            && self.expires_utc.map_or(true, |exp| exp > Utc::now())
    }

    pub fn is_password(&self) -> bool {
        self.credential_type == CredentialType::Password
    }
}
