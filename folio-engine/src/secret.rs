//! Credential handling for auth collections.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use folio_crypto::{hash_secret, CryptoError, HashedSecret, KdfParams};
use folio_model::CollectionSchema;
use serde_json::Value;

pub const HASH_KEY: &str = "hash";
pub const SALT_KEY: &str = "salt";

/// One-way transform applied to a plaintext secret before it is stored.
#[async_trait]
pub trait SecretFieldTransformer: Send + Sync {
    async fn transform(&self, secret: &str) -> EngineResult<HashedSecret>;
}

/// Argon2id with a fresh random salt per secret.
#[derive(Debug, Clone, Default)]
pub struct Argon2Secrets {
    params: KdfParams,
}

impl Argon2Secrets {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl SecretFieldTransformer for Argon2Secrets {
    async fn transform(&self, secret: &str) -> EngineResult<HashedSecret> {
        let secret = secret.to_string();
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || hash_secret(&secret, &params))
            .await
            .map_err(|e| EngineError::Crypto(CryptoError::KeyDerivation(e.to_string())))?
            .map_err(EngineError::from)
    }
}

/// Removes the plaintext secret and the stored hash/salt from a document
/// view. No-op for collections without auth.
pub fn strip_secrets(schema: &CollectionSchema, value: &mut Value) {
    let (Some(auth), Some(map)) = (schema.auth.as_ref(), value.as_object_mut()) else {
        return;
    };
    map.remove(&auth.secret_field);
    map.remove(HASH_KEY);
    map.remove(SALT_KEY);
}
