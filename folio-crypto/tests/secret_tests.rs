use folio_crypto::{hash_secret, verify_secret, CryptoError, HashedSecret, KdfParams, Salt, SALT_SIZE};

fn params() -> KdfParams {
    KdfParams::insecure_fast()
}

// ── Hashing ───────────────────────────────────────────────────────

#[test]
fn hash_is_hex_and_salted() {
    let hashed = hash_secret("hunter2", &params()).unwrap();
    assert_eq!(hashed.hash.len(), 64);
    assert_eq!(hashed.salt.len(), SALT_SIZE * 2);
    assert!(hashed.hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn same_secret_gets_different_salts() {
    let a = hash_secret("same", &params()).unwrap();
    let b = hash_secret("same", &params()).unwrap();
    assert_ne!(a.salt, b.salt);
    assert_ne!(a.hash, b.hash);
}

#[test]
fn empty_secret_rejected() {
    assert!(matches!(hash_secret("", &params()), Err(CryptoError::EmptySecret)));
}

#[test]
fn invalid_params_error() {
    let bad = KdfParams {
        memory_cost: 1,
        time_cost: 0,
        parallelism: 0,
    };
    assert!(matches!(hash_secret("x", &bad), Err(CryptoError::KeyDerivation(_))));
}

// ── Verification ─────────────────────────────────────────────────

#[test]
fn verify_accepts_correct_secret() {
    let hashed = hash_secret("correct horse", &params()).unwrap();
    assert!(verify_secret("correct horse", &hashed, &params()).unwrap());
    assert!(!verify_secret("wrong horse", &hashed, &params()).unwrap());
}

#[test]
fn verify_rejects_bad_encoding() {
    let stored = HashedSecret {
        hash: "zz".into(),
        salt: Salt::random().to_hex(),
    };
    assert!(matches!(verify_secret("x", &stored, &params()), Err(CryptoError::Encoding(_))));

    let short_salt = HashedSecret {
        hash: "00".into(),
        salt: "0011".into(),
    };
    assert!(matches!(
        verify_secret("x", &short_salt, &params()),
        Err(CryptoError::InvalidSaltLength { expected: 16, actual: 2 })
    ));
}

#[test]
fn debug_redacts_hash() {
    let hashed = hash_secret("s3cret", &params()).unwrap();
    let dbg = format!("{hashed:?}");
    assert!(dbg.contains("REDACTED"));
    assert!(!dbg.contains(&hashed.hash));
}

#[test]
fn salt_hex_roundtrip() {
    let salt = Salt::from_bytes([7u8; SALT_SIZE]);
    assert_eq!(Salt::from_hex(&salt.to_hex()).unwrap(), salt);
}
