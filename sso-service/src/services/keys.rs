//! Signing key material and the JWKS projection of its public halves.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::services::ServiceError;

const RSA_KEY_BITS: usize = 2048;

/// Asymmetric key pair with a human-readable name.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    private_key: RsaPrivateKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    pub fn new(name: &str, private_key: RsaPrivateKey, created_at: DateTime<Utc>) -> Self {
        let kid = thumbprint(&private_key);
        Self {
            kid,
            name: name.to_string(),
            created_at,
            private_key,
        }
    }

    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`).
    pub fn from_pem(
        name: &str,
        pem: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| anyhow::anyhow!("Failed to parse signing key {}: {}", name, e))?;
        Ok(Self::new(name, private_key, created_at))
    }

    pub fn generate(name: &str) -> Result<Self, ServiceError> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| anyhow::anyhow!("Failed to generate signing key: {}", e))?;
        Ok(Self::new(name, private_key, Utc::now()))
    }

    pub fn to_pkcs8_pem(&self) -> Result<String, ServiceError> {
        let pem = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| anyhow::anyhow!("Failed to encode signing key: {}", e))?;
        Ok(pem.to_string())
    }

    pub fn encoding_key(&self) -> Result<EncodingKey, ServiceError> {
        let der = self
            .private_key
            .to_pkcs1_der()
            .map_err(|e| anyhow::anyhow!("Failed to encode signing key: {}", e))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }

    pub fn jwk(&self) -> Jwk {
        let (n, e) = public_components(&self.private_key);
        Jwk {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            alg: "RS256".to_string(),
            kid: self.kid.clone(),
            n,
            e,
        }
    }
}

fn public_components(key: &RsaPrivateKey) -> (String, String) {
    let public = key.to_public_key();
    (
        URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
        URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
    )
}

/// RFC 7638 thumbprint: SHA-256 over the required members in lexical order.
fn thumbprint(key: &RsaPrivateKey) -> String {
    let (n, e) = public_components(key);
    let canonical = format!(r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#, e, n);
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

/// Persistence for private keys. Append-only.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn get_private_keys(&self) -> Result<Vec<SigningKey>, ServiceError>;
    async fn save_private_key(&self, key: &SigningKey) -> Result<(), ServiceError>;
}

#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: Mutex<Vec<SigningKey>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: SigningKey) -> Self {
        Self {
            keys: Mutex::new(vec![key]),
        }
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn get_private_keys(&self) -> Result<Vec<SigningKey>, ServiceError> {
        let keys = self
            .keys
            .lock()
            .map_err(|e| anyhow::anyhow!("Key store mutex poisoned: {}", e))?;
        Ok(keys.clone())
    }

    async fn save_private_key(&self, key: &SigningKey) -> Result<(), ServiceError> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|e| anyhow::anyhow!("Key store mutex poisoned: {}", e))?;
        if !keys.iter().any(|k| k.kid == key.kid) {
            keys.push(key.clone());
        }
        Ok(())
    }
}

/// Read-mostly cache over a [`KeyStore`].
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    cache: RwLock<Option<Arc<Vec<SigningKey>>>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(None),
        }
    }

    async fn keys(&self) -> Result<Arc<Vec<SigningKey>>, ServiceError> {
        if let Some(keys) = self.cache.read().await.as_ref() {
            return Ok(keys.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(keys) = cache.as_ref() {
            return Ok(keys.clone());
        }
        let keys = Arc::new(self.store.get_private_keys().await?);
        // An empty set is not cached so a key provisioned later is picked up.
        if !keys.is_empty() {
            *cache = Some(keys.clone());
        }
        Ok(keys)
    }

    /// Most recently created key.
    pub async fn active_key(&self) -> Result<SigningKey, ServiceError> {
        self.keys()
            .await?
            .iter()
            .max_by_key(|k| k.created_at)
            .cloned()
            .ok_or(ServiceError::KeysNotFound)
    }

    pub async fn save_key(&self, key: &SigningKey) -> Result<(), ServiceError> {
        self.store.save_private_key(key).await?;
        *self.cache.write().await = None;
        tracing::info!(kid = %key.kid, name = %key.name, "Signing key saved");
        Ok(())
    }

    pub async fn export_public_keys(&self) -> Result<Jwks, ServiceError> {
        let keys = self.keys().await?;
        Ok(Jwks {
            keys: keys.iter().map(SigningKey::jwk).collect(),
        })
    }

    pub async fn public_key(&self, kid: &str) -> Result<Option<Jwk>, ServiceError> {
        Ok(self
            .keys()
            .await?
            .iter()
            .find(|k| k.kid == kid)
            .map(SigningKey::jwk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_signing_key, TEST_PRIVATE_KEY_PEM};
    use chrono::Duration;

    #[test]
    fn test_jwk_shape() {
        let key = test_signing_key();
        let jwk = key.jwk();
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.key_use, "sig");
        assert_eq!(jwk.alg, "RS256");
        assert_eq!(jwk.e, "AQAB");
        assert_eq!(jwk.kid, key.kid);

        let json = serde_json::to_value(&jwk).unwrap();
        assert_eq!(json["use"], "sig");
        assert!(json.get("d").is_none());
    }

    #[test]
    fn test_kid_is_stable_across_loads() {
        let a = SigningKey::from_pem("a", TEST_PRIVATE_KEY_PEM, Utc::now()).unwrap();
        let b = SigningKey::from_pem("b", TEST_PRIVATE_KEY_PEM, Utc::now()).unwrap();
        assert_eq!(a.kid, b.kid);
        assert_eq!(a.kid.len(), 43);
    }

    #[test]
    fn test_pem_round_trip_keeps_kid() {
        let key = test_signing_key();
        let pem = key.to_pkcs8_pem().unwrap();
        let reloaded = SigningKey::from_pem("reloaded", &pem, Utc::now()).unwrap();
        assert_eq!(reloaded.kid, key.kid);
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        let err = SigningKey::from_pem("bad", "not a key", Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::Unknown(_)));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let debug = format!("{:?}", test_signing_key());
        assert!(debug.contains("kid"));
        assert!(!debug.contains("private_key"));
    }

    #[tokio::test]
    async fn test_no_keys() {
        let manager = KeyManager::new(Arc::new(InMemoryKeyStore::new()));
        assert!(matches!(
            manager.active_key().await,
            Err(ServiceError::KeysNotFound)
        ));
        assert!(manager.export_public_keys().await.unwrap().keys.is_empty());
    }

    #[tokio::test]
    async fn test_active_key_is_most_recent() {
        let store = Arc::new(InMemoryKeyStore::new());
        let manager = KeyManager::new(store.clone());

        let pem = TEST_PRIVATE_KEY_PEM;
        let older = SigningKey::from_pem("older", pem, Utc::now() - Duration::days(1)).unwrap();
        manager.save_key(&older).await.unwrap();
        assert_eq!(manager.active_key().await.unwrap().name, "older");

        // Same material under another name keeps its kid, so it is a no-op in the store.
        let same = SigningKey::from_pem("same", pem, Utc::now()).unwrap();
        manager.save_key(&same).await.unwrap();
        assert_eq!(manager.export_public_keys().await.unwrap().keys.len(), 1);
        assert_eq!(manager.active_key().await.unwrap().name, "older");

        let jwk = manager.public_key(&older.kid).await.unwrap().unwrap();
        assert_eq!(jwk.kid, older.kid);
        assert!(manager.public_key("missing").await.unwrap().is_none());
    }
}
