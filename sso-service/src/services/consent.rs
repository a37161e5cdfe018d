//! Consent store capability.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::Consent;
use crate::services::ServiceError;

#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// True when a consent record exists and its scopes include every
    /// requested scope.
    async fn has_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> Result<bool, ServiceError>;

    /// Merges `scopes` into the stored grant, creating it if needed.
    async fn save(&self, user_id: Uuid, client_id: &str, scopes: &[String])
        -> Result<(), ServiceError>;

    /// Scopes registered for the client.
    async fn client_scopes(&self, client_id: &str) -> Result<Vec<String>, ServiceError>;
}

#[derive(Default)]
pub struct InMemoryConsentStore {
    consents: DashMap<(Uuid, String), Consent>,
    client_scopes: DashMap<String, Vec<String>>,
}

impl InMemoryConsentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_client_scopes(&self, client_id: &str, scopes: Vec<String>) {
        self.client_scopes.insert(client_id.to_string(), scopes);
    }
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn has_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> Result<bool, ServiceError> {
        Ok(self
            .consents
            .get(&(user_id, client_id.to_string()))
            .map(|c| c.covers(scopes))
            .unwrap_or(false))
    }

    async fn save(
        &self,
        user_id: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> Result<(), ServiceError> {
        self.consents
            .entry((user_id, client_id.to_string()))
            .and_modify(|c| c.merge(scopes))
            .or_insert_with(|| Consent::new(user_id, client_id, scopes));
        Ok(())
    }

    async fn client_scopes(&self, client_id: &str) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .client_scopes
            .get(client_id)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }
}
