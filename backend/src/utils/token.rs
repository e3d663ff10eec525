//! Opaque bearer tokens for sessions and password reset links.
//!
//! Raw tokens carry the full entropy of the OS random source and are handed
//! to the client exactly once. Only [`hash_token`] output is persisted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Floor applied to every token request.
pub const MIN_BYTES_PER_TOKEN: usize = 32;

#[derive(Debug, thiserror::Error)]
#[error("entropy source unavailable: {0}")]
pub struct TokenError(#[from] rand::Error);

/// Returns `max(n_bytes, MIN_BYTES_PER_TOKEN)` random bytes, URL-safe base64
/// encoded without padding.
pub fn generate_token(n_bytes: usize) -> Result<String, TokenError> {
    let mut bytes = vec![0u8; n_bytes.max(MIN_BYTES_PER_TOKEN)];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 digest of the raw token, lower-case hex.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Re-hashes the presented raw token and compares it with a stored digest.
pub fn token_matches(presented: &str, stored_hash: &str) -> bool {
    hash_token(presented)
        .as_bytes()
        .ct_eq(stored_hash.as_bytes())
        .into()
}

/// Token factory carrying the configured token length.
#[derive(Debug, Clone, Copy)]
pub struct TokenGenerator {
    bytes_per_token: usize,
}

/// A freshly generated token together with its storage digest.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub raw: String,
    pub hash: String,
}

impl TokenGenerator {
    pub fn new(bytes_per_token: usize) -> Self {
        Self {
            bytes_per_token: bytes_per_token.max(MIN_BYTES_PER_TOKEN),
        }
    }

    pub fn bytes_per_token(&self) -> usize {
        self.bytes_per_token
    }

    pub fn issue(&self) -> Result<IssuedToken, TokenError> {
        let raw = generate_token(self.bytes_per_token)?;
        let hash = hash_token(&raw);
        Ok(IssuedToken { raw, hash })
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(MIN_BYTES_PER_TOKEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_token() {
        let token = "test-token-123";
        let hash1 = hash_token(token);
        let hash2 = hash_token(token);
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash_token("different-token"), hash1);
    }

    #[test]
    fn generated_tokens_are_url_safe() {
        let token = generate_token(32).expect("token");
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn short_requests_are_raised_to_the_minimum() {
        let token = generate_token(4).expect("token");
        let decoded = URL_SAFE_NO_PAD.decode(token).expect("decode");
        assert_eq!(decoded.len(), MIN_BYTES_PER_TOKEN);
        assert_eq!(TokenGenerator::new(8).bytes_per_token(), MIN_BYTES_PER_TOKEN);
        assert_eq!(TokenGenerator::new(48).bytes_per_token(), 48);
    }

    #[test]
    fn issued_hash_matches_raw_token() {
        let issued = TokenGenerator::default().issue().expect("issue");
        assert_eq!(issued.hash, hash_token(&issued.raw));
        assert!(token_matches(&issued.raw, &issued.hash));
        assert!(!token_matches("forged", &issued.hash));
        assert!(!token_matches(&issued.hash, &issued.hash));
    }

    #[test]
    fn ten_thousand_tokens_have_no_hash_collisions() {
        let generator = TokenGenerator::default();
        let mut seen = HashSet::with_capacity(10_000);
        for _ in 0..10_000 {
            let issued = generator.issue().expect("issue");
            assert!(seen.insert(issued.hash), "hash collision");
        }
    }
}
