use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::models::Client;

#[derive(Debug, Clone, Deserialize)]
pub struct SsoConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub issuer: String,
    pub session: SessionConfig,
    pub tokens: TokenConfig,
    pub signing_key: SigningKeyConfig,
    pub password_hash: PasswordHashConfig,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    /// Upstream OpenID provider; federated login is disabled without it.
    pub federation: Option<FederationConfig>,
    /// Relying parties registered at startup.
    pub clients: Vec<ClientRegistration>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: Secret<String>,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub auth_code_ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigningKeyConfig {
    /// PEM file; when unset the key store must already hold a key, or one is
    /// generated outside production.
    pub path: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordHashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    pub issuer: String,
    /// Expected `aud` of upstream ID tokens (this service's client id there).
    pub audience: String,
    pub jwks_url: String,
}

/// One relying party from `SSO_CLIENTS` (a JSON array).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<Secret<String>>,
    pub name: String,
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl ClientRegistration {
    pub fn to_client(&self) -> Client {
        Client::new(
            self.client_id.clone(),
            self.client_secret.as_ref().map(|s| s.expose_secret().as_str()),
            self.name.clone(),
            self.redirect_uris.clone(),
        )
    }
}

const MIN_PROD_SECRET_LEN: usize = 32;

impl SsoConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let database = match get_optional_env("DATABASE_URL", is_prod)? {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse(
                    "DATABASE_MAX_CONNECTIONS",
                    get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
                )?,
            }),
            None => None,
        };

        let federation = match env::var("OIDC_ISSUER").ok() {
            Some(issuer) => Some(FederationConfig {
                issuer,
                audience: get_env("OIDC_AUDIENCE", None, is_prod)?,
                jwks_url: get_env("OIDC_JWKS_URL", None, is_prod)?,
            }),
            None => None,
        };

        let clients = match env::var("SSO_CLIENTS").ok() {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("SSO_CLIENTS: {}", e))
            })?,
            None => Vec::new(),
        };

        let config = SsoConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("sso-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            issuer: get_env("SSO_ISSUER", Some("http://localhost:8080"), is_prod)?,
            session: SessionConfig {
                secret: Secret::new(get_env(
                    "SESSION_SECRET",
                    Some("dev-session-secret"),
                    is_prod,
                )?),
                ttl_seconds: parse(
                    "SESSION_TTL_SECONDS",
                    get_env("SESSION_TTL_SECONDS", Some("3600"), is_prod)?,
                )?,
            },
            tokens: TokenConfig {
                access_token_ttl_seconds: parse(
                    "ACCESS_TOKEN_TTL_SECONDS",
                    get_env("ACCESS_TOKEN_TTL_SECONDS", Some("3600"), is_prod)?,
                )?,
                refresh_token_ttl_seconds: parse(
                    "REFRESH_TOKEN_TTL_SECONDS",
                    get_env("REFRESH_TOKEN_TTL_SECONDS", Some("86400"), is_prod)?,
                )?,
                auth_code_ttl_seconds: parse(
                    "AUTH_CODE_TTL_SECONDS",
                    get_env("AUTH_CODE_TTL_SECONDS", Some("300"), is_prod)?,
                )?,
            },
            signing_key: SigningKeyConfig {
                path: env::var("SIGNING_KEY_PATH").ok(),
                name: get_env("SIGNING_KEY_NAME", Some("default"), is_prod)?,
            },
            password_hash: PasswordHashConfig {
                memory_kib: parse(
                    "PASSWORD_HASH_MEMORY_KIB",
                    get_env("PASSWORD_HASH_MEMORY_KIB", Some("19456"), is_prod)?,
                )?,
                iterations: parse(
                    "PASSWORD_HASH_ITERATIONS",
                    get_env("PASSWORD_HASH_ITERATIONS", Some("2"), is_prod)?,
                )?,
            },
            database,
            redis: env::var("REDIS_URL").ok().map(|url| RedisConfig { url }),
            federation,
            clients,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        let ttls = [
            ("SESSION_TTL_SECONDS", self.session.ttl_seconds),
            ("ACCESS_TOKEN_TTL_SECONDS", self.tokens.access_token_ttl_seconds),
            ("REFRESH_TOKEN_TTL_SECONDS", self.tokens.refresh_token_ttl_seconds),
            ("AUTH_CODE_TTL_SECONDS", self.tokens.auth_code_ttl_seconds),
        ];
        if let Some((key, _)) = ttls.iter().find(|(_, ttl)| *ttl <= 0) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "{} must be positive",
                key
            )));
        }

        if self.session.secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_SECRET must not be empty"
            )));
        }

        if self.is_prod() && self.session.secret.expose_secret().len() < MIN_PROD_SECRET_LEN {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_SECRET must be at least {} bytes in production",
                MIN_PROD_SECRET_LEN
            )));
        }

        Ok(())
    }
}

impl Default for SsoConfig {
    /// Development settings with in-memory stores.
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "sso-service".to_string(),
            log_level: "info".to_string(),
            issuer: "http://localhost:8080".to_string(),
            session: SessionConfig {
                secret: Secret::new("dev-session-secret".to_string()),
                ttl_seconds: 3600,
            },
            tokens: TokenConfig {
                access_token_ttl_seconds: 3600,
                refresh_token_ttl_seconds: 86400,
                auth_code_ttl_seconds: 300,
            },
            signing_key: SigningKeyConfig {
                path: None,
                name: "default".to_string(),
            },
            password_hash: PasswordHashConfig {
                memory_kib: 19456,
                iterations: 2,
            },
            database: None,
            redis: None,
            federation: None,
            clients: Vec::new(),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Optional in development, required in production.
fn get_optional_env(key: &str, is_prod: bool) -> Result<Option<String>, AppError> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(_) if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required in production but not set",
            key
        ))),
        Err(_) => Ok(None),
    }
}

fn parse<T>(key: &str, value: String) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
