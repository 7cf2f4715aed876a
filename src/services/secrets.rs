//! Secret generation and hashing.
//!
//! Every token in the system comes from the OS-seeded CSPRNG behind
//! `rand::rng()`. High-entropy machine secrets (API keys, signing secrets,
//! session tokens) are stored as plain SHA-256 digests: they only ever need a
//! fast equality lookup, not a slow salted hash.

use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

use crate::models::KeyPrefix;

/// Random bytes in an API key or signing secret (hex-encoded to 64 chars).
const SECRET_BYTE_LENGTH: usize = 32;

/// Prefix of webhook signing secrets.
pub const SIGNING_SECRET_PREFIX: &str = "whsec_";

/// Generate `byte_length` random bytes.
pub fn generate_bytes(byte_length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; byte_length];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate `byte_length` random bytes as lowercase hex.
pub fn generate_hex(byte_length: usize) -> String {
    hex::encode(generate_bytes(byte_length))
}

/// Generate a full API key secret: `fus_live_`/`fus_test_` + 64 hex chars.
pub fn api_key_secret(prefix: KeyPrefix) -> String {
    format!("{}{}", prefix.secret_prefix(), generate_hex(SECRET_BYTE_LENGTH))
}

/// Generate a webhook signing secret: `whsec_` + 64 hex chars.
pub fn signing_secret() -> String {
    format!("{}{}", SIGNING_SECRET_PREFIX, generate_hex(SECRET_BYTE_LENGTH))
}

/// Generate an opaque admin session token (64 hex chars).
pub fn session_token() -> String {
    generate_hex(SECRET_BYTE_LENGTH)
}

/// Generate a 6-digit admin verification code, uniformly in 100000..=999999.
pub fn verification_code() -> String {
    let code: u32 = rand::rng().random_range(100_000..=999_999);
    code.to_string()
}

/// Hash a secret with SHA-256 for storage comparison. One-way, deterministic.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Last four characters of a secret, for masked display.
pub fn last4(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    chars[chars.len().saturating_sub(4)..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_hex_length_and_charset() {
        let hex = generate_hex(32);
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_api_key_secret_prefixes() {
        assert!(api_key_secret(KeyPrefix::Live).starts_with("fus_live_"));
        assert!(api_key_secret(KeyPrefix::Test).starts_with("fus_test_"));
        assert_eq!(api_key_secret(KeyPrefix::Live).len(), "fus_live_".len() + 64);
    }

    #[test]
    fn test_signing_secret_pattern() {
        let secret = signing_secret();
        assert!(secret.starts_with("whsec_"));
        let tail = &secret["whsec_".len()..];
        assert_eq!(tail.len(), 64);
        assert!(tail.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verification_code_is_six_digits() {
        for _ in 0..100 {
            let code = verification_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn test_hash_secret_deterministic() {
        let h1 = hash_secret("fus_test_abc");
        let h2 = hash_secret("fus_test_abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64); // SHA-256 produces 64 hex chars
        assert_ne!(h1, hash_secret("fus_test_abd"));
    }

    #[test]
    fn test_last4() {
        assert_eq!(last4("fus_test_0123abcd"), "abcd");
        assert_eq!(last4("abc"), "abc");
    }

    #[test]
    fn test_secrets_are_unique() {
        assert_ne!(session_token(), session_token());
        assert_ne!(signing_secret(), signing_secret());
    }
}
