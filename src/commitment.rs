//! Commit-then-reveal codec
//!
//! A commitment is `hex(SHA-256("{number}:{salt}"))`. The browser client builds
//! the exact same string with `crypto.subtle.digest`, so anyone holding a
//! finished game's result can audit it.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Number of random bytes in a salt (hex-encoded to twice as many chars)
pub const SALT_BYTES: usize = 16;

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Hash a number together with its salt
pub fn commit(number: u32, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", number, salt).as_bytes());
    hex::encode(hasher.finalize())
}

/// Fresh random salt from the thread-local CSPRNG
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Check that `number` and `salt` open the commitment `hash`
pub fn verify(number: u32, salt: &str, hash: &str) -> bool {
    let expected = commit(number, salt);
    constant_time_eq(expected.as_bytes(), hash.to_ascii_lowercase().as_bytes())
}

/// Whether `hash` looks like something `commit` could have produced
pub fn is_well_formed_hash(hash: &str) -> bool {
    hash.len() == HASH_HEX_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Constant-time byte comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_known_vector() {
        // echo -n "7:abc" | sha256sum
        assert_eq!(
            commit(7, "abc"),
            "d9d02ef46913e78745d85b7ee05d3e0e27006b67a080a426be4414c506b82aab"
        );
    }

    #[test]
    fn test_commit_is_deterministic() {
        let salt = generate_salt();
        assert_eq!(commit(3, &salt), commit(3, &salt));
    }

    #[test]
    fn test_verify_accepts_matching_opening() {
        for number in [1, 5, 10, 1000] {
            let salt = generate_salt();
            let hash = commit(number, &salt);
            assert!(verify(number, &salt, &hash));
        }
    }

    #[test]
    fn test_verify_rejects_other_number() {
        let salt = generate_salt();
        let hash = commit(7, &salt);
        for other in (1..=10).filter(|n| *n != 7) {
            assert!(!verify(other, &salt, &hash));
        }
    }

    #[test]
    fn test_verify_rejects_other_salt() {
        let hash = commit(7, &generate_salt());
        assert!(!verify(7, &generate_salt(), &hash));
    }

    #[test]
    fn test_verify_ignores_hex_case() {
        let salt = generate_salt();
        let hash = commit(4, &salt).to_uppercase();
        assert!(verify(4, &salt, &hash));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(!verify(1, "salt", ""));
        assert!(!verify(1, "salt", "not a hash"));
    }

    #[test]
    fn test_generate_salt_shape() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), SALT_BYTES * 2);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_is_well_formed_hash() {
        assert!(is_well_formed_hash(&commit(1, "x")));
        assert!(is_well_formed_hash(&commit(1, "x").to_uppercase()));
        assert!(!is_well_formed_hash("abc"));
        assert!(!is_well_formed_hash(&"g".repeat(HASH_HEX_LEN)));
    }
}
