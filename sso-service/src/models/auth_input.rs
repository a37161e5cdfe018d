//! Provider-tagged authentication inputs.

use secrecy::Secret;
use std::fmt;

use crate::services::ServiceError;
use crate::utils::Password;

/// Identity type recorded for identities created through the federated path.
pub const OAUTH_PROVIDER: &str = "oauth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvider {
    Email,
    OAuth,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Email => "email",
            AuthProvider::OAuth => OAUTH_PROVIDER,
        }
    }
}

impl std::str::FromStr for AuthProvider {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(AuthProvider::Email),
            OAUTH_PROVIDER => Ok(AuthProvider::OAuth),
            other => Err(ServiceError::InvalidAuthProvider(other.to_string())),
        }
    }
}

/// Claims taken from a verified federated identity token.
#[derive(Clone)]
pub struct FederatedAssertion {
    pub provider: String,
    pub external_id: String,
    pub issuer: String,
    pub email: String,
    pub raw_token: String,
}

impl fmt::Debug for FederatedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederatedAssertion")
            .field("provider", &self.provider)
            .field("external_id", &self.external_id)
            .field("issuer", &self.issuer)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Login input. The federated variant carries the upstream ID token still
/// unverified; claims are read from it only after verification.
#[derive(Debug, Clone)]
pub enum Credentials {
    Email { email: String, password: Password },
    Federated { id_token: Secret<String> },
}

/// Registration input. Federated registration is the same find-or-link
/// operation as federated login.
#[derive(Debug, Clone)]
pub enum Registration {
    Email {
        name: String,
        email: String,
        password: Password,
    },
    Federated { id_token: Secret<String> },
}

impl Credentials {
    pub fn provider(&self) -> AuthProvider {
        match self {
            Credentials::Email { .. } => AuthProvider::Email,
            Credentials::Federated { .. } => AuthProvider::OAuth,
        }
    }
}

impl Registration {
    pub fn provider(&self) -> AuthProvider {
        match self {
            Registration::Email { .. } => AuthProvider::Email,
            Registration::Federated { .. } => AuthProvider::OAuth,
        }
    }
}
