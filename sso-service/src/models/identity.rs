//! User identity model - one row per way of proving who a user is.
//!
//! `(identity_type, external_id, issuer)` is unique and is the federation
//! lookup key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity type for local email/password sign-in.
pub const EMAIL_IDENTITY: &str = "email";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Identity {
    pub identity_id: Uuid,
    pub user_id: Uuid,
    pub identity_type: String,
    pub external_id: String,
    pub issuer: String,
    pub created_utc: DateTime<Utc>,
}

impl Identity {
    /// Local identity; the external id is the (normalized) email.
    pub fn new_email(user_id: Uuid, email: &str, issuer: &str) -> Self {
        Self::new(user_id, EMAIL_IDENTITY, email, issuer)
    }

    /// Federated identity keyed by the provider's subject and issuer.
    pub fn new_federated(user_id: Uuid, provider: &str, external_id: &str, issuer: &str) -> Self {
        Self::new(user_id, provider, external_id, issuer)
    }

    fn new(user_id: Uuid, identity_type: &str, external_id: &str, issuer: &str) -> Self {
        Self {
            identity_id: Uuid::new_v4(),
            user_id,
            identity_type: identity_type.to_string(),
            external_id: external_id.to_string(),
            issuer: issuer.to_string(),
            created_utc: Utc::now(),
        }
    }

    pub fn is_email(&self) -> bool {
        self.identity_type == EMAIL_IDENTITY
    }

    pub fn matches_key(&self, identity_type: &str, external_id: &str, issuer: &str) -> bool {
        self.identity_type == identity_type
            && self.external_id == external_id
            && self.issuer == issuer
    }
}
