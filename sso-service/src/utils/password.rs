use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};

use crate::services::ServiceError;

/// Raw password as received. Never printed.
#[derive(Clone, Debug)]
pub struct Password(Secret<String>);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Secret::new(password.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl ExposeSecret<String> for Password {
    fn expose_secret(&self) -> &String {
        self.0.expose_secret()
    }
}

/// One-way password hashing.
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash(&self, password: &Password) -> Result<String, ServiceError>;
    /// `InvalidCredentials` on mismatch or an unparseable stored hash.
    async fn verify(&self, password: &Password, hash: &str) -> Result<(), ServiceError>;
}

/// Argon2id with a configurable cost. Hashing runs on the blocking pool.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, ServiceError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

#[async_trait]
impl CredentialHasher for Argon2Hasher {
    async fn hash(&self, password: &Password) -> Result<String, ServiceError> {
        let argon2 = self.argon2();
        let password = password.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.expose_secret().as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| ServiceError::Unknown(anyhow::anyhow!("Failed to hash password: {}", e)))
        })
        .await
        .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))?
    }

    async fn verify(&self, password: &Password, hash: &str) -> Result<(), ServiceError> {
        let argon2 = self.argon2();
        let password = password.clone();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || {
            let parsed_hash =
                PasswordHash::new(&hash).map_err(|_| ServiceError::InvalidCredentials)?;
            argon2
                .verify_password(password.expose_secret().as_bytes(), &parsed_hash)
                .map_err(|_| ServiceError::InvalidCredentials)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(8, 1).expect("valid params")
    }

    #[tokio::test]
    async fn test_hash_password() {
        let hash = hasher().hash(&Password::new("mySecurePassword123")).await.unwrap();
        assert!(hash.starts_with("$argon2id"));
    }

    #[tokio::test]
    async fn test_verify_password_correct_and_incorrect() {
        let hasher = hasher();
        let password = Password::new("mySecurePassword123");
        let hash = hasher.hash(&password).await.unwrap();

        assert!(hasher.verify(&password, &hash).await.is_ok());
        assert!(matches!(
            hasher.verify(&Password::new("wrongPassword"), &hash).await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_different_hashes_for_same_password() {
        let hasher = hasher();
        let password = Password::new("mySecurePassword123");
        let hash1 = hasher.hash(&password).await.unwrap();
        let hash2 = hasher.hash(&password).await.unwrap();
        assert_ne!(hash1, hash2);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_invalid_credentials() {
        assert!(matches!(
            hasher().verify(&Password::new("pw"), "not-a-hash").await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let rendered = format!("{:?}", Password::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
