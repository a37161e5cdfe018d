pub mod accounts;
pub mod auth;
pub mod auth_codes;
pub mod clients;
pub mod consent;
pub mod database;
pub mod error;
pub mod federation;
pub mod identity;
pub mod jwt;
pub mod keys;
pub mod oauth;
pub mod redis;
pub mod users;

pub use accounts::UserService;
pub use auth::AuthService;
pub use auth_codes::{AuthCodeStore, InMemoryAuthCodeStore};
pub use clients::{ClientDirectory, InMemoryClientDirectory};
pub use consent::{ConsentStore, InMemoryConsentStore};
pub use database::Database;
pub use error::ServiceError;
pub use federation::{IdTokenVerifier, OidcVerifier};
pub use identity::IdentityResolver;
pub use jwt::{JwtService, SessionClaims, TokenClaims, TokenResponse};
pub use keys::{InMemoryKeyStore, Jwk, Jwks, KeyManager, KeyStore, SigningKey};
pub use oauth::{AuthorizeOutcome, ConsentView, ExchangeRequest, OAuthService};
pub use self::redis::RedisAuthCodeStore;
pub use users::{InMemoryUserStore, UserRepository};
