//! OAuth2 authorization-code grant: client/redirect validation, consent
//! gating, single-use code issuance and exchange for signed tokens.

use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{join_scopes, Client};
use crate::services::{
    AuthCodeStore, ClientDirectory, ConsentStore, Jwks, JwtService, KeyManager, ServiceError,
    TokenResponse,
};

/// What the user is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentView {
    pub user_id: Uuid,
    pub client_id: String,
    pub client_name: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// `redirect_uri?code=...`
    Redirect { redirect_to: String },
    ConsentRequired(ConsentView),
}

#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub code: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub user_id: Uuid,
}

#[derive(Clone)]
pub struct OAuthService {
    clients: Arc<dyn ClientDirectory>,
    consents: Arc<dyn ConsentStore>,
    codes: Arc<dyn AuthCodeStore>,
    keys: Arc<KeyManager>,
    jwt: JwtService,
    code_ttl: Duration,
}

impl OAuthService {
    pub fn new(
        clients: Arc<dyn ClientDirectory>,
        consents: Arc<dyn ConsentStore>,
        codes: Arc<dyn AuthCodeStore>,
        keys: Arc<KeyManager>,
        jwt: JwtService,
        code_ttl: Duration,
    ) -> Self {
        Self {
            clients,
            consents,
            codes,
            keys,
            jwt,
            code_ttl,
        }
    }

    async fn validate_client(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<Client, ServiceError> {
        let client = self
            .clients
            .by_id(client_id)
            .await?
            .filter(Client::is_active)
            .ok_or(ServiceError::ClientNotFound)?;

        if !client.allows_redirect(redirect_uri) {
            tracing::warn!(client_id, redirect_uri, "Redirect URI not whitelisted");
            return Err(ServiceError::RedirectURINotAllowed);
        }
        Ok(client)
    }

    /// An empty request asks for the client's registered scopes.
    async fn requested_scopes(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> Result<Vec<String>, ServiceError> {
        let mut scopes = if scopes.is_empty() {
            self.consents.client_scopes(client_id).await?
        } else {
            scopes.to_vec()
        };
        scopes.sort();
        scopes.dedup();
        Ok(scopes)
    }

    async fn issue_code(
        &self,
        user_id: Uuid,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<String, ServiceError> {
        let code = self
            .codes
            .issue(client_id, redirect_uri, user_id, &join_scopes(scopes), self.code_ttl)
            .await?;
        tracing::info!(%user_id, client_id, "Authorization code issued");

        Ok(format!("{}?code={}", redirect_uri, code))
    }

    #[tracing::instrument(skip(self, scopes))]
    pub async fn authorize(
        &self,
        user_id: Uuid,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<AuthorizeOutcome, ServiceError> {
        let client = self.validate_client(client_id, redirect_uri).await?;
        let scopes = self.requested_scopes(client_id, scopes).await?;

        if !self.consents.has_consent(user_id, client_id, &scopes).await? {
            return Ok(AuthorizeOutcome::ConsentRequired(ConsentView {
                user_id,
                client_id: client.client_id,
                client_name: client.name,
                redirect_uri: redirect_uri.to_string(),
                scopes,
            }));
        }

        let redirect_to = self.issue_code(user_id, client_id, redirect_uri, &scopes).await?;
        Ok(AuthorizeOutcome::Redirect { redirect_to })
    }

    /// Records approval (merging with earlier grants) and issues a code.
    /// Returns the `redirect_uri?code=...` redirect.
    #[tracing::instrument(skip(self, scopes))]
    pub async fn grant_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<String, ServiceError> {
        self.validate_client(client_id, redirect_uri).await?;
        let scopes = self.requested_scopes(client_id, scopes).await?;

        self.consents.save(user_id, client_id, &scopes).await?;
        tracing::info!(%user_id, client_id, scopes = %join_scopes(&scopes), "Consent granted");

        self.issue_code(user_id, client_id, redirect_uri, &scopes).await
    }

    /// The `denied` terminal state: nothing is stored, no code is issued.
    #[tracing::instrument(skip(self))]
    pub async fn deny_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<String, ServiceError> {
        self.validate_client(client_id, redirect_uri).await?;
        tracing::info!(%user_id, client_id, "Consent denied");
        Ok(format!("{}?error=access_denied", redirect_uri))
    }

    /// Every bound-field or secret mismatch is `InvalidAuthCode`; the
    /// specific reason only reaches the log.
    #[tracing::instrument(skip_all, fields(client_id = %request.client_id, user_id = %request.user_id))]
    pub async fn exchange_code(
        &self,
        request: ExchangeRequest,
    ) -> Result<TokenResponse, ServiceError> {
        let client = self
            .clients
            .by_id(&request.client_id)
            .await?
            .filter(Client::is_active)
            .ok_or(ServiceError::ClientNotFound)?;

        let auth_code = self
            .codes
            .get(&request.code)
            .await?
            .ok_or(ServiceError::AuthCodeNotFound)?;

        if auth_code.is_expired() {
            self.codes.delete(&request.code).await?;
            tracing::warn!("Authorization code expired");
            return Err(ServiceError::AuthCodeNotFound);
        }

        if !auth_code.is_bound_to(&request.client_id, &request.redirect_uri, request.user_id) {
            tracing::warn!(reason = "binding mismatch", "Authorization code rejected");
            return Err(ServiceError::InvalidAuthCode);
        }
        if !client.verify_secret(request.client_secret.as_deref()) {
            tracing::warn!(reason = "client secret mismatch", "Authorization code rejected");
            return Err(ServiceError::InvalidAuthCode);
        }

        // Resolved before the code is consumed so a missing key leaves it usable.
        let key = self.keys.active_key().await?;

        if !self.codes.delete(&request.code).await? {
            tracing::warn!("Authorization code already consumed");
            return Err(ServiceError::AuthCodeNotFound);
        }

        let tokens =
            self.jwt
                .issue_token_pair(auth_code.user_id, &auth_code.client_id, &auth_code.scope, &key)?;
        tracing::info!(kid = %key.kid, "Authorization code exchanged");
        Ok(tokens)
    }

    pub async fn jwks(&self) -> Result<Jwks, ServiceError> {
        self.keys.export_public_keys().await
    }
}
