//! Argon2id secret hashing.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Size of the derived hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Size of salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Salt for secret hashing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt {
    bytes: [u8; SALT_SIZE],
}

impl Salt {
    /// Generates a random salt.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a salt from raw bytes.
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parses a hex-encoded salt as stored on a document.
    pub fn from_hex(encoded: &str) -> CryptoResult<Self> {
        let raw = hex::decode(encoded)?;
        let bytes: [u8; SALT_SIZE] =
            raw.as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidSaltLength {
                    expected: SALT_SIZE,
                    actual: raw.len(),
                })?;
        Ok(Self { bytes })
    }

    /// Returns the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

/// Argon2id cost parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP recommendations for Argon2id (2023)
        Self {
            memory_cost: 19 * 1024, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Fast, insecure parameters for tests.
    pub fn insecure_fast() -> Self {
        Self {
            memory_cost: 1024, // 1 MiB
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// A hashed secret ready to persist. Both parts are hex-encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedSecret {
    pub hash: String,
    pub salt: String,
}

impl std::fmt::Debug for HashedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashedSecret")
            .field("hash", &"[REDACTED]")
            .field("salt", &self.salt)
            .finish()
    }
}

fn derive(secret: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<Zeroizing<[u8; HASH_SIZE]>> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(HASH_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut out = Zeroizing::new([0u8; HASH_SIZE]);
    argon2
        .hash_password_into(secret.as_bytes(), salt.as_bytes(), &mut out[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// Hashes `secret` under a fresh random salt.
pub fn hash_secret(secret: &str, params: &KdfParams) -> CryptoResult<HashedSecret> {
    if secret.is_empty() {
        return Err(CryptoError::EmptySecret);
    }
    let salt = Salt::random();
    let hash = derive(secret, &salt, params)?;
    Ok(HashedSecret {
        hash: hex::encode(&hash[..]),
        salt: salt.to_hex(),
    })
}

/// Checks `secret` against a stored hash/salt pair in constant time.
pub fn verify_secret(secret: &str, stored: &HashedSecret, params: &KdfParams) -> CryptoResult<bool> {
    let salt = Salt::from_hex(&stored.salt)?;
    let expected = Zeroizing::new(hex::decode(&stored.hash)?);
    let actual = derive(secret, &salt, params)?;
    if expected.len() != actual.len() {
        return Ok(false);
    }
    let diff = expected
        .iter()
        .zip(actual.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    Ok(diff == 0)
}
