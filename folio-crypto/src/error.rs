//! Error types for credential hashing.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while hashing or verifying secrets.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (bad parameters or Argon2 failure).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// A stored hash or salt is not valid hex.
    #[error("invalid encoding: {0}")]
    Encoding(#[from] hex::FromHexError),

    /// Invalid salt length.
    #[error("invalid salt length: expected {expected}, got {actual}")]
    InvalidSaltLength { expected: usize, actual: usize },

    /// The secret is empty.
    #[error("secret must not be empty")]
    EmptySecret,
}
