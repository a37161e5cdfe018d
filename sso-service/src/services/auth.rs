use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;

use crate::{
    models::{Credentials, FederatedAssertion, Registration, User, OAUTH_PROVIDER},
    services::{IdTokenVerifier, IdentityResolver, JwtService, ServiceError},
};

/// Login and registration: resolve the user, check eligibility, mint a
/// session token. Holds no state of its own.
#[derive(Clone)]
pub struct AuthService {
    resolver: IdentityResolver,
    jwt: JwtService,
    federation: Option<Arc<dyn IdTokenVerifier>>,
}

impl AuthService {
    /// Without a verifier the federated provider is refused.
    pub fn new(
        resolver: IdentityResolver,
        jwt: JwtService,
        federation: Option<Arc<dyn IdTokenVerifier>>,
    ) -> Self {
        Self {
            resolver,
            jwt,
            federation,
        }
    }

    async fn verified_assertion(
        &self,
        id_token: &Secret<String>,
    ) -> Result<FederatedAssertion, ServiceError> {
        let verifier = self
            .federation
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidAuthProvider(OAUTH_PROVIDER.to_string()))?;
        verifier.verify(id_token.expose_secret()).await
    }

    async fn resolve_federated(&self, id_token: &Secret<String>) -> Result<User, ServiceError> {
        let assertion = self.verified_assertion(id_token).await?;
        self.resolver.resolve_federated(&assertion).await
    }

    #[tracing::instrument(skip_all, fields(provider = credentials.provider().as_str()))]
    pub async fn login(&self, credentials: Credentials) -> Result<String, ServiceError> {
        let result = match &credentials {
            Credentials::Email { email, password } => {
                self.resolver.authenticate_email(email, password).await
            }
            Credentials::Federated { id_token } => self.resolve_federated(id_token).await,
        };

        let user = result.map_err(|e| {
            if e.is_authentication_failure() {
                tracing::warn!(reason = %e, "Login rejected");
            }
            e
        })?;

        self.issue_session(&user)
    }

    #[tracing::instrument(skip_all, fields(provider = registration.provider().as_str()))]
    pub async fn register(&self, registration: Registration) -> Result<String, ServiceError> {
        let user = match &registration {
            Registration::Email {
                name,
                email,
                password,
            } => self.resolver.register_email(name, email, password).await?,
            Registration::Federated { id_token } => self.resolve_federated(id_token).await?,
        };

        self.issue_session(&user)
    }

    fn issue_session(&self, user: &User) -> Result<String, ServiceError> {
        if !user.can_login() {
            tracing::warn!(user_id = %user.user_id, status = user.status.as_str(), "Login rejected");
            return Err(ServiceError::UserCannotBeLoggedIn);
        }
        let token = self.jwt.issue_session_token(user.user_id)?;
        tracing::info!(user_id = %user.user_id, "Session issued");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryUserStore, UserRepository};
    use crate::utils::{Argon2Hasher, Password};
    use async_trait::async_trait;

    /// Accepts exactly one token value.
    struct StaticVerifier;

    #[async_trait]
    impl IdTokenVerifier for StaticVerifier {
        async fn verify(&self, id_token: &str) -> Result<FederatedAssertion, ServiceError> {
            if id_token != "signed-upstream-token" {
                return Err(ServiceError::InvalidCredentials);
            }
            Ok(FederatedAssertion {
                provider: OAUTH_PROVIDER.to_string(),
                external_id: "sub-1".to_string(),
                issuer: "https://idp.example.com".to_string(),
                email: "fed@example.com".to_string(),
                raw_token: id_token.to_string(),
            })
        }
    }

    fn setup_with(
        federation: Option<Arc<dyn IdTokenVerifier>>,
    ) -> (Arc<InMemoryUserStore>, AuthService, JwtService) {
        let store = Arc::new(InMemoryUserStore::new());
        let hasher = Arc::new(Argon2Hasher::new(8, 1).unwrap());
        let resolver = IdentityResolver::new(store.clone(), hasher, "https://sso.test");
        let jwt = JwtService::new("secret", "https://sso.test", 3600, 900, 86400);
        (store, AuthService::new(resolver, jwt.clone(), federation), jwt)
    }

    fn setup() -> (Arc<InMemoryUserStore>, AuthService, JwtService) {
        setup_with(Some(Arc::new(StaticVerifier)))
    }

    fn email_registration() -> Registration {
        Registration::Email {
            name: "user".to_string(),
            email: "user@example.com".to_string(),
            password: Password::new("pw"),
        }
    }

    fn email_login(password: &str) -> Credentials {
        Credentials::Email {
            email: "user@example.com".to_string(),
            password: Password::new(password),
        }
    }

    fn federated_login(token: &str) -> Credentials {
        Credentials::Federated {
            id_token: Secret::new(token.to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_and_login_issue_sessions_for_same_user() {
        let (_, service, jwt) = setup();
        let registered = service.register(email_registration()).await.unwrap();
        let logged_in = service.login(email_login("pw")).await.unwrap();

        let a = jwt.validate_session_token(&registered).unwrap();
        let b = jwt.validate_session_token(&logged_in).unwrap();
        assert_eq!(a.sub, b.sub);
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let (store, service, _) = setup();
        service.register(email_registration()).await.unwrap();
        let err = service.login(email_login("nope")).await.unwrap_err();
        assert!(err.is_authentication_failure());
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_blocked_user_cannot_log_in() {
        let (store, service, _) = setup();
        service.register(email_registration()).await.unwrap();

        let mut user = store.by_email("user@example.com").await.unwrap().unwrap();
        user.block().unwrap();
        store.update(&user).await.unwrap();

        assert!(matches!(
            service.login(email_login("pw")).await,
            Err(ServiceError::UserCannotBeLoggedIn)
        ));
    }

    #[tokio::test]
    async fn test_federated_register_then_login() {
        let (store, service, _) = setup();

        service
            .register(Registration::Federated {
                id_token: Secret::new("signed-upstream-token".to_string()),
            })
            .await
            .unwrap();
        service
            .login(federated_login("signed-upstream-token"))
            .await
            .unwrap();
        assert_eq!(store.user_count(), 1);
        assert_eq!(store.identity_count(), 1);
    }

    #[tokio::test]
    async fn test_unverified_token_creates_nothing() {
        let (store, service, _) = setup();
        service.register(email_registration()).await.unwrap();

        let err = service.login(federated_login("forged")).await.unwrap_err();

        assert!(err.is_authentication_failure());
        assert_eq!(store.user_count(), 1);
        assert_eq!(store.identity_count(), 1);
    }

    #[tokio::test]
    async fn test_federation_disabled_without_verifier() {
        let (_, service, _) = setup_with(None);
        assert!(matches!(
            service.login(federated_login("signed-upstream-token")).await,
            Err(ServiceError::InvalidAuthProvider(p)) if p == OAUTH_PROVIDER
        ));
    }
}
