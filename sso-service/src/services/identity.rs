//! Maps heterogeneous credentials onto one canonical user, creating or
//! linking records on first contact.

use std::sync::Arc;

use crate::models::{Credential, FederatedAssertion, Identity, User};
use crate::services::{ServiceError, UserRepository};
use crate::utils::{CredentialHasher, Password};

#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
    issuer: String,
}

impl IdentityResolver {
    /// `issuer` is recorded on locally created email identities.
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn CredentialHasher>,
        issuer: &str,
    ) -> Self {
        Self {
            users,
            hasher,
            issuer: issuer.to_string(),
        }
    }

    /// Email/password sign-in. Login eligibility is the caller's check.
    pub async fn authenticate_email(
        &self,
        email: &str,
        password: &Password,
    ) -> Result<User, ServiceError> {
        let user = self
            .users
            .by_email(email)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let identity = self
            .users
            .identities(user.user_id)
            .await?
            .into_iter()
            .find(Identity::is_email)
            .ok_or(ServiceError::IdentityNotFound)?;

        let credential = self
            .users
            .credentials(identity.identity_id)
            .await?
            .into_iter()
            .find(|c| c.is_password() && c.is_usable())
            .ok_or(ServiceError::CredentialNotFound)?;

        self.hasher.verify(password, &credential.secret).await?;
        Ok(user)
    }

    /// Registration by email. Never verifies, only creates.
    pub async fn register_email(
        &self,
        name: &str,
        email: &str,
        password: &Password,
    ) -> Result<User, ServiceError> {
        let user = User::new(name, email)?;
        if password.is_empty() {
            return Err(ServiceError::EmptyPasswordIsNotPermitted);
        }

        if self.users.by_email(&user.email).await?.is_some() {
            return Err(ServiceError::UserAlreadyExists);
        }

        let hash = self.hasher.hash(password).await?;
        let identity = Identity::new_email(user.user_id, &user.email, &self.issuer);
        let credential = Credential::new_password(identity.identity_id, hash);

        match self.users.register_user(&user, &identity, &credential).await {
            Ok(()) => {}
            Err(ServiceError::UniqueViolated) => return Err(ServiceError::UserAlreadyExists),
            Err(e) => return Err(e),
        }

        tracing::info!(user_id = %user.user_id, "User registered");
        Ok(user)
    }

    /// Find-or-link for federated login and registration alike:
    /// 1. identity already linked: return its owner, no writes
    /// 2. a user with the asserted email exists: link a new identity to it
    /// 3. otherwise create user, identity and credential together
    ///
    /// A concurrent first contact for the same subject shows up as a
    /// uniqueness conflict and is resolved by re-reading.
    pub async fn resolve_federated(
        &self,
        assertion: &FederatedAssertion,
    ) -> Result<User, ServiceError> {
        if let Some(user) = self.find_linked(assertion).await? {
            return Ok(user);
        }

        if let Some(user) = self.users.by_email(&assertion.email).await? {
            return self.link(user, assertion).await;
        }

        let user = User::new(&assertion.email, &assertion.email)?;
        let identity = self.federated_identity(&user, assertion);
        let credential = Credential::new_oauth(identity.identity_id, assertion.raw_token.clone());

        match self.users.register_user(&user, &identity, &credential).await {
            Ok(()) => {
                tracing::info!(
                    user_id = %user.user_id,
                    provider = %assertion.provider,
                    "User created from federated identity"
                );
                Ok(user)
            }
            Err(ServiceError::UniqueViolated) => {
                if let Some(user) = self.find_linked(assertion).await? {
                    return Ok(user);
                }
                match self.users.by_email(&assertion.email).await? {
                    Some(user) => self.link(user, assertion).await,
                    None => Err(ServiceError::UniqueViolated),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn find_linked(
        &self,
        assertion: &FederatedAssertion,
    ) -> Result<Option<User>, ServiceError> {
        self.users
            .by_identity(&assertion.provider, &assertion.external_id, &assertion.issuer)
            .await
    }

    fn federated_identity(&self, user: &User, assertion: &FederatedAssertion) -> Identity {
        Identity::new_federated(
            user.user_id,
            &assertion.provider,
            &assertion.external_id,
            &assertion.issuer,
        )
    }

    /// Attaches a federated identity to an existing user (merge by email).
    async fn link(
        &self,
        user: User,
        assertion: &FederatedAssertion,
    ) -> Result<User, ServiceError> {
        let identity = self.federated_identity(&user, assertion);

        match self.users.save_identity(&identity).await {
            Ok(()) => {}
            Err(ServiceError::UniqueViolated) => {
                // Linked concurrently; the stored identity names the owner.
                return self
                    .find_linked(assertion)
                    .await?
                    .ok_or(ServiceError::UniqueViolated);
            }
            Err(e) => return Err(e),
        }

        let credential = Credential::new_oauth(identity.identity_id, assertion.raw_token.clone());
        self.users
            .save_credential(&credential)
            .await
            .map_err(|e| e.into_unknown("identity linked without credential"))?;

        tracing::info!(
            user_id = %user.user_id,
            provider = %assertion.provider,
            "Federated identity linked to existing user"
        );
        Ok(user)
    }
}
