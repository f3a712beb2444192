//! Property-based tests for secret hashing.

use folio_crypto::{hash_secret, verify_secret, KdfParams};
use proptest::prelude::*;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn secret_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 !@#$%^&*()]{1,64}").unwrap()
}

// =============================================================================
// VERIFICATION PROPERTIES
// =============================================================================

mod verification {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// A stored hash verifies the secret it was made from
        #[test]
        fn hash_verifies_its_own_secret(secret in secret_strategy()) {
            let params = KdfParams::insecure_fast();
            let stored = hash_secret(&secret, &params).unwrap();
            prop_assert!(verify_secret(&secret, &stored, &params).unwrap());
        }

        /// A stored hash rejects any other secret
        #[test]
        fn hash_rejects_other_secrets(a in secret_strategy(), b in secret_strategy()) {
            prop_assume!(a != b);
            let params = KdfParams::insecure_fast();
            let stored = hash_secret(&a, &params).unwrap();
            prop_assert!(!verify_secret(&b, &stored, &params).unwrap());
        }
    }
}
