//! Authorization code registry capability.

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::AuthCode;
use crate::services::ServiceError;

#[async_trait]
pub trait AuthCodeStore: Send + Sync {
    /// Stores a fresh code bound to the given fields and returns its value.
    async fn issue(
        &self,
        client_id: &str,
        redirect_uri: &str,
        user_id: Uuid,
        scope: &str,
        ttl: Duration,
    ) -> Result<String, ServiceError>;

    /// Returns the bound fields without consuming the code. Expiry is the
    /// caller's check.
    async fn get(&self, code: &str) -> Result<Option<AuthCode>, ServiceError>;

    /// Atomic delete-if-present. `true` only for the one caller that removed it.
    async fn delete(&self, code: &str) -> Result<bool, ServiceError>;
}

#[derive(Default)]
pub struct InMemoryAuthCodeStore {
    codes: DashMap<String, AuthCode>,
}

impl InMemoryAuthCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Drops every expired code. Expired codes already fail validation;
    /// this only reclaims memory.
    pub fn purge_expired(&self) -> usize {
        let before = self.codes.len();
        self.codes.retain(|_, code| !code.is_expired());
        before - self.codes.len()
    }
}

#[async_trait]
impl AuthCodeStore for InMemoryAuthCodeStore {
    async fn issue(
        &self,
        client_id: &str,
        redirect_uri: &str,
        user_id: Uuid,
        scope: &str,
        ttl: Duration,
    ) -> Result<String, ServiceError> {
        let auth_code = AuthCode::new(client_id, redirect_uri, user_id, scope, ttl);
        let code = auth_code.code.clone();
        self.codes.insert(code.clone(), auth_code);
        Ok(code)
    }

    async fn get(&self, code: &str) -> Result<Option<AuthCode>, ServiceError> {
        Ok(self.codes.get(code).map(|c| c.value().clone()))
    }

    async fn delete(&self, code: &str) -> Result<bool, ServiceError> {
        Ok(self.codes.remove(code).is_some())
    }
}
