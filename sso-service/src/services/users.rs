//! User/identity/credential persistence capability and its in-memory
//! implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{normalize_email, Credential, Identity, User};
use crate::services::ServiceError;

/// Lookups return `Ok(None)` when absent; `Err` is reserved for
/// infrastructure failures and uniqueness conflicts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;
    async fn by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn by_identity(
        &self,
        identity_type: &str,
        external_id: &str,
        issuer: &str,
    ) -> Result<Option<User>, ServiceError>;
    async fn identities(&self, user_id: Uuid) -> Result<Vec<Identity>, ServiceError>;
    async fn credentials(&self, identity_id: Uuid) -> Result<Vec<Credential>, ServiceError>;

    async fn create(&self, user: &User) -> Result<(), ServiceError>;
    async fn update(&self, user: &User) -> Result<(), ServiceError>;
    async fn save_identity(&self, identity: &Identity) -> Result<(), ServiceError>;
    async fn save_credential(&self, credential: &Credential) -> Result<(), ServiceError>;

    /// Writes user, identity and credential as one unit: either all three
    /// are stored or none is.
    async fn register_user(
        &self,
        user: &User,
        identity: &Identity,
        credential: &Credential,
    ) -> Result<(), ServiceError>;
}

#[derive(Default)]
struct Graph {
    users: HashMap<Uuid, User>,
    identities: HashMap<Uuid, Identity>,
    credentials: HashMap<Uuid, Credential>,
}

impl Graph {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.user_id) != except)
    }

    fn identity_taken(&self, identity: &Identity) -> bool {
        self.identities.values().any(|i| {
            i.identity_id != identity.identity_id
                && i.matches_key(&identity.identity_type, &identity.external_id, &identity.issuer)
        })
    }

    fn check_user(&self, user: &User) -> Result<(), ServiceError> {
        if self.users.contains_key(&user.user_id) || self.email_taken(&user.email, None) {
            return Err(ServiceError::UniqueViolated);
        }
        Ok(())
    }

    fn check_identity(&self, identity: &Identity) -> Result<(), ServiceError> {
        if self.identities.contains_key(&identity.identity_id) || self.identity_taken(identity) {
            return Err(ServiceError::UniqueViolated);
        }
        Ok(())
    }

    fn check_credential(&self, credential: &Credential) -> Result<(), ServiceError> {
        if self.credentials.contains_key(&credential.credential_id) {
            return Err(ServiceError::UniqueViolated);
        }
        Ok(())
    }
}

/// Identity graph held behind one lock, enforcing the same uniqueness rules
/// as the SQL schema (email, and the identity federation key).
#[derive(Default)]
pub struct InMemoryUserStore {
    graph: Mutex<Graph>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Graph>, ServiceError> {
        self.graph
            .lock()
            .map_err(|e| ServiceError::Unknown(anyhow::anyhow!("User store mutex poisoned: {}", e)))
    }

    pub fn user_count(&self) -> usize {
        self.lock().map(|g| g.users.len()).unwrap_or_default()
    }

    pub fn identity_count(&self) -> usize {
        self.lock().map(|g| g.identities.len()).unwrap_or_default()
    }

    pub fn credential_count(&self) -> usize {
        self.lock().map(|g| g.credentials.len()).unwrap_or_default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserStore {
    async fn by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let email = normalize_email(email);
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn by_identity(
        &self,
        identity_type: &str,
        external_id: &str,
        issuer: &str,
    ) -> Result<Option<User>, ServiceError> {
        let graph = self.lock()?;
        Ok(graph
            .identities
            .values()
            .find(|i| i.matches_key(identity_type, external_id, issuer))
            .and_then(|i| graph.users.get(&i.user_id))
            .cloned())
    }

    async fn identities(&self, user_id: Uuid) -> Result<Vec<Identity>, ServiceError> {
        let mut identities: Vec<Identity> = self
            .lock()?
            .identities
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        identities.sort_by_key(|i| i.created_utc);
        Ok(identities)
    }

    async fn credentials(&self, identity_id: Uuid) -> Result<Vec<Credential>, ServiceError> {
        let mut credentials: Vec<Credential> = self
            .lock()?
            .credentials
            .values()
            .filter(|c| c.identity_id == identity_id)
            .cloned()
            .collect();
        credentials.sort_by_key(|c| c.created_utc);
        Ok(credentials)
    }

    async fn create(&self, user: &User) -> Result<(), ServiceError> {
        let mut graph = self.lock()?;
        graph.check_user(user)?;
        graph.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), ServiceError> {
        let mut graph = self.lock()?;
        if !graph.users.contains_key(&user.user_id) {
            return Err(ServiceError::UserNotFound);
        }
        if graph.email_taken(&user.email, Some(user.user_id)) {
            return Err(ServiceError::UniqueViolated);
        }
        graph.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn save_identity(&self, identity: &Identity) -> Result<(), ServiceError> {
        let mut graph = self.lock()?;
        if !graph.users.contains_key(&identity.user_id) {
            return Err(ServiceError::UserNotFound);
        }
        graph.check_identity(identity)?;
        graph.identities.insert(identity.identity_id, identity.clone());
        Ok(())
    }

    async fn save_credential(&self, credential: &Credential) -> Result<(), ServiceError> {
        let mut graph = self.lock()?;
        if !graph.identities.contains_key(&credential.identity_id) {
            return Err(ServiceError::IdentityNotFound);
        }
        graph.check_credential(credential)?;
        graph.credentials.insert(credential.credential_id, credential.clone());
        Ok(())
    }

    async fn register_user(
        &self,
        user: &User,
        identity: &Identity,
        credential: &Credential,
    ) -> Result<(), ServiceError> {
        let mut graph = self.lock()?;
        graph.check_user(user)?;
        graph.check_identity(identity)?;
        graph.check_credential(credential)?;

        graph.users.insert(user.user_id, user.clone());
        graph.identities.insert(identity.identity_id, identity.clone());
        graph.credentials.insert(credential.credential_id, credential.clone());
        Ok(())
    }
}
