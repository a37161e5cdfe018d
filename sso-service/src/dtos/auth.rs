use secrecy::Secret;
use serde::{Deserialize, Serialize};

use crate::models::{AuthProvider, Credentials, Registration};
use crate::services::ServiceError;
use crate::utils::Password;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub provider: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Upstream ID token for `provider: "oauth"`.
    #[serde(default)]
    pub id_token: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub provider: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Upstream ID token for `provider: "oauth"`.
    #[serde(default)]
    pub id_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub sso_session_token: String,
}

fn id_token(raw: String) -> Result<Secret<String>, ServiceError> {
    if raw.is_empty() {
        return Err(ServiceError::InvalidCredentials);
    }
    Ok(Secret::new(raw))
}

impl TryFrom<LoginRequest> for Credentials {
    type Error = ServiceError;

    fn try_from(req: LoginRequest) -> Result<Self, Self::Error> {
        match req.provider.parse::<AuthProvider>()? {
            AuthProvider::Email => Ok(Credentials::Email {
                email: req.email,
                password: Password::new(req.password),
            }),
            AuthProvider::OAuth => Ok(Credentials::Federated {
                id_token: id_token(req.id_token)?,
            }),
        }
    }
}

impl TryFrom<RegisterRequest> for Registration {
    type Error = ServiceError;

    fn try_from(req: RegisterRequest) -> Result<Self, Self::Error> {
        match req.provider.parse::<AuthProvider>()? {
            AuthProvider::Email => Ok(Registration::Email {
                name: req.name,
                email: req.email,
                password: Password::new(req.password),
            }),
            AuthProvider::OAuth => Ok(Registration::Federated {
                id_token: id_token(req.id_token)?,
            }),
        }
    }
}
