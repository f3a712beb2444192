//! Credential hashing for Folio.
//!
//! Auth collections never store plaintext secrets. An incoming secret is
//! stretched with Argon2id under a fresh random salt; the hex-encoded hash
//! and salt are what gets persisted.

mod error;
mod secret;

pub use error::{CryptoError, CryptoResult};
pub use secret::{hash_secret, verify_secret, HashedSecret, KdfParams, Salt, HASH_SIZE, SALT_SIZE};
