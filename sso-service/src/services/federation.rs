//! Verification of ID tokens issued by the upstream identity provider.
//! Federated claims are only ever read from a token that passed these checks.

use async_trait::async_trait;
use jsonwebtoken::{
    decode, decode_header,
    jwk::{Jwk, JwkSet},
    Algorithm, DecodingKey, Validation,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::FederationConfig;
use crate::models::{FederatedAssertion, OAUTH_PROVIDER};
use crate::services::ServiceError;

const ACCEPTED_ALGORITHMS: [Algorithm; 5] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::ES256,
];

#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    /// `InvalidCredentials` for any token that fails verification.
    async fn verify(&self, id_token: &str) -> Result<FederatedAssertion, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    iss: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
}

/// Checks signature, `iss`, `aud` and `exp` against the provider's JWKS.
/// The key set is refetched when a token names an unknown `kid`.
pub struct OidcVerifier {
    issuer: String,
    audience: String,
    jwks_url: Option<String>,
    http: reqwest::Client,
    keys: RwLock<Arc<JwkSet>>,
}

impl OidcVerifier {
    pub fn new(config: &FederationConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            jwks_url: Some(config.jwks_url.clone()),
            http: reqwest::Client::new(),
            keys: RwLock::new(Arc::new(JwkSet { keys: Vec::new() })),
        }
    }

    /// Fixed key set, never refetched.
    pub fn with_jwks(issuer: &str, audience: &str, jwks: JwkSet) -> Self {
        Self {
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            jwks_url: None,
            http: reqwest::Client::new(),
            keys: RwLock::new(Arc::new(jwks)),
        }
    }

    async fn key_for(&self, kid: &str) -> Result<Jwk, ServiceError> {
        if let Some(jwk) = self.keys.read().await.find(kid) {
            return Ok(jwk.clone());
        }

        let Some(url) = &self.jwks_url else {
            tracing::warn!(kid, "ID token signed with unknown key");
            return Err(ServiceError::InvalidCredentials);
        };

        let fetched = Arc::new(self.fetch_jwks(url).await?);
        let jwk = fetched.find(kid).cloned();
        *self.keys.write().await = fetched;

        jwk.ok_or_else(|| {
            tracing::warn!(kid, "ID token signed with unknown key");
            ServiceError::InvalidCredentials
        })
    }

    async fn fetch_jwks(&self, url: &str) -> Result<JwkSet, ServiceError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch upstream JWKS: {}", e))?;

        if !response.status().is_success() {
            return Err(ServiceError::Unknown(anyhow::anyhow!(
                "Upstream JWKS returned {}",
                response.status()
            )));
        }

        let jwks = response
            .json::<JwkSet>()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse upstream JWKS: {}", e))?;
        tracing::info!(keys = jwks.keys.len(), "Upstream JWKS refreshed");
        Ok(jwks)
    }
}

#[async_trait]
impl IdTokenVerifier for OidcVerifier {
    async fn verify(&self, id_token: &str) -> Result<FederatedAssertion, ServiceError> {
        let header = decode_header(id_token).map_err(|_| ServiceError::InvalidCredentials)?;
        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            tracing::warn!(alg = ?header.alg, "ID token algorithm not accepted");
            return Err(ServiceError::InvalidCredentials);
        }
        let kid = header.kid.ok_or(ServiceError::InvalidCredentials)?;

        let jwk = self.key_for(&kid).await?;
        let decoding_key =
            DecodingKey::from_jwk(&jwk).map_err(|_| ServiceError::InvalidCredentials)?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let claims = decode::<IdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| {
                tracing::warn!(error = %e, "ID token rejected");
                ServiceError::InvalidCredentials
            })?
            .claims;

        // Accounts are linked by email, so only a provider-verified address counts.
        let email = match (claims.email, claims.email_verified) {
            (Some(email), Some(true)) if !email.is_empty() => email,
            _ => {
                tracing::warn!(sub = %claims.sub, "ID token has no verified email");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        Ok(FederatedAssertion {
            provider: OAUTH_PROVIDER.to_string(),
            external_id: claims.sub,
            issuer: claims.iss,
            email,
            raw_token: id_token.to_string(),
        })
    }
}
