use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::keys::{Jwks, SigningKey};
use crate::services::ServiceError;

/// Issues HS256 session tokens and RS256 OAuth tokens.
#[derive(Clone)]
pub struct JwtService {
    session_encoding_key: EncodingKey,
    session_decoding_key: DecodingKey,
    issuer: String,
    session_ttl_seconds: i64,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
}

/// Claims for the local SSO session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Claims shared by access and refresh tokens; only `exp` differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub aud: String,
    pub client_id: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub scope: String,
}

/// Token response returned to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(
        session_secret: &str,
        issuer: &str,
        session_ttl_seconds: i64,
        access_token_ttl_seconds: i64,
        refresh_token_ttl_seconds: i64,
    ) -> Self {
        Self {
            session_encoding_key: EncodingKey::from_secret(session_secret.as_bytes()),
            session_decoding_key: DecodingKey::from_secret(session_secret.as_bytes()),
            issuer: issuer.to_string(),
            session_ttl_seconds,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    pub fn issue_session_token(&self, user_id: Uuid) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.session_ttl_seconds)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.session_encoding_key,
        )
        .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e).into())
    }

    /// Any decode, signature, issuer or expiry failure is `InvalidSession`.
    pub fn validate_session_token(&self, token: &str) -> Result<SessionClaims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.session_decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                ServiceError::InvalidSession
            })?;
        Ok(data.claims)
    }

    /// Claims for an access or refresh token, expiring after `ttl_seconds`.
    pub fn oauth_claims(
        &self,
        user_id: Uuid,
        client_id: &str,
        scope: &str,
        ttl_seconds: i64,
    ) -> TokenClaims {
        let now = Utc::now();
        TokenClaims {
            sub: user_id.to_string(),
            aud: client_id.to_string(),
            client_id: client_id.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
            jti: Uuid::new_v4().to_string(),
            scope: scope.to_string(),
        }
    }

    pub fn sign_with_key(
        &self,
        claims: &TokenClaims,
        key: &SigningKey,
    ) -> Result<String, ServiceError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid.clone());

        encode(&header, claims, &key.encoding_key()?)
            .map_err(|e| anyhow::anyhow!("Failed to sign token: {}", e).into())
    }

    /// Access and refresh token pair for one exchange.
    pub fn issue_token_pair(
        &self,
        user_id: Uuid,
        client_id: &str,
        scope: &str,
        key: &SigningKey,
    ) -> Result<TokenResponse, ServiceError> {
        let access = self.oauth_claims(user_id, client_id, scope, self.access_token_ttl_seconds);
        let refresh = self.oauth_claims(user_id, client_id, scope, self.refresh_token_ttl_seconds);

        Ok(TokenResponse {
            access_token: self.sign_with_key(&access, key)?,
            refresh_token: self.sign_with_key(&refresh, key)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl_seconds,
        })
    }

    /// Verifies an RS256 token against the published key named by its `kid`.
    pub fn validate_oauth_token(
        &self,
        token: &str,
        jwks: &Jwks,
        audience: &str,
    ) -> Result<TokenClaims, ServiceError> {
        let header = decode_header(token).map_err(|_| ServiceError::InvalidToken)?;
        let kid = header.kid.ok_or(ServiceError::InvalidToken)?;
        let jwk = jwks.find(&kid).ok_or(ServiceError::InvalidToken)?;

        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|_| ServiceError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "OAuth token rejected");
            ServiceError::InvalidToken
        })?;
        Ok(data.claims)
    }
}
