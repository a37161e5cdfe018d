//! Authorization code - short-lived, single-use grant bound to a client,
//! redirect URI and user.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_AUTH_CODE_TTL_SECONDS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub user_id: Uuid,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl AuthCode {
    pub fn new(
        client_id: &str,
        redirect_uri: &str,
        user_id: Uuid,
        scope: &str,
        ttl: Duration,
    ) -> Self {
        Self {
            code: generate_code(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            user_id,
            scope: scope.to_string(),
            issued_at: Utc::now(),
            ttl_seconds: ttl.num_seconds(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::seconds(self.ttl_seconds)
    }

    /// Expired once `issued_at + ttl < now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() < now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Every bound field must match exactly.
    pub fn is_bound_to(&self, client_id: &str, redirect_uri: &str, user_id: Uuid) -> bool {
        self.client_id == client_id && self.redirect_uri == redirect_uri && self.user_id == user_id
    }
}

/// 256 bits from the thread RNG, hex encoded.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let code = AuthCode::new("id1", "https://client/cb", Uuid::new_v4(), "profile", Duration::seconds(300));
        let expires = code.expires_at();
        assert!(!code.is_expired_at(expires));
        assert!(code.is_expired_at(expires + Duration::milliseconds(1)));
        assert!(!code.is_expired());
    }

    #[test]
    fn test_binding_requires_every_field() {
        let user_id = Uuid::new_v4();
        let code = AuthCode::new("id1", "https://client/cb", user_id, "", Duration::seconds(300));
        assert!(code.is_bound_to("id1", "https://client/cb", user_id));
        assert!(!code.is_bound_to("id2", "https://client/cb", user_id));
        assert!(!code.is_bound_to("id1", "https://client/other", user_id));
        assert!(!code.is_bound_to("id1", "https://client/cb", Uuid::new_v4()));
    }

    #[test]
    fn test_codes_are_unique_and_opaque() {
        let a = generate_code();
        let b = generate_code();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
