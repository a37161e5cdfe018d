pub mod auth_code;
pub mod auth_input;
pub mod client;
pub mod consent;
pub mod credential;
pub mod identity;
pub mod user;

pub use auth_code::{generate_code, AuthCode, DEFAULT_AUTH_CODE_TTL_SECONDS};
pub use auth_input::{AuthProvider, Credentials, FederatedAssertion, Registration, OAUTH_PROVIDER};
pub use client::{Client, ClientStatus};
pub use consent::{join_scopes, parse_scopes, Consent};
pub use credential::{Credential, CredentialStatus, CredentialType};
pub use identity::{Identity, EMAIL_IDENTITY};
pub use user::{normalize_email, User, UserStatus};
