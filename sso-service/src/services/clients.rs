//! Client directory capability.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::Client;
use crate::services::ServiceError;

#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Lookup by the client-facing id.
    async fn by_id(&self, client_id: &str) -> Result<Option<Client>, ServiceError>;
}

#[derive(Default)]
pub struct InMemoryClientDirectory {
    clients: DashMap<String, Client>,
}

impl InMemoryClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client: Client) {
        self.clients.insert(client.client_id.clone(), client);
    }
}

#[async_trait]
impl ClientDirectory for InMemoryClientDirectory {
    async fn by_id(&self, client_id: &str) -> Result<Option<Client>, ServiceError> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }
}
