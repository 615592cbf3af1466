//! Generation and at-rest hashing of tokens, codes and client secrets.
//!
//! Access tokens, refresh tokens and authorization codes are high-entropy
//! random strings. They are stored only as SHA-256 digests: the values are
//! already unguessable, so a fast unsalted hash keeps lookups indexable
//! while a database dump reveals nothing usable. Client secrets go through
//! bcrypt like any other credential.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::OAuthError;

/// Length of generated tokens and authorization codes (256 bits of entropy)
pub const TOKEN_LENGTH: usize = 43;

/// Length of generated client secrets
pub const CLIENT_SECRET_LENGTH: usize = 48;

/// Bcrypt cost factor for client secrets
pub const BCRYPT_COST: u32 = 12;

/// URL-safe character set for tokens and codes
const TOKEN_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generate a random bearer token / authorization code string.
pub fn generate_token() -> String {
    random_string(TOKEN_LENGTH, TOKEN_CHARSET)
}

/// Generate a random client secret.
pub fn generate_client_secret() -> String {
    random_string(CLIENT_SECRET_LENGTH, TOKEN_CHARSET)
}

fn random_string(length: usize, charset: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..charset.len());
            charset[idx] as char
        })
        .collect()
}

/// Hash a token or authorization code for storage (hex-encoded SHA-256).
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a client secret using bcrypt.
pub fn hash_client_secret(secret: &str) -> Result<String, OAuthError> {
    bcrypt::hash(secret, BCRYPT_COST)
        .map_err(|e| OAuthError::ServerError(format!("secret hashing failed: {}", e)))
}

/// Verify a presented client secret against a stored bcrypt hash.
///
/// Bcrypt's verifier compares digests in constant time.
pub fn verify_client_secret(secret: &str, hash: &str) -> Result<bool, OAuthError> {
    bcrypt::verify(secret, hash)
        .map_err(|e| OAuthError::ServerError(format!("secret verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_length_and_charset() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        for c in token.chars() {
            assert!(
                c.is_ascii_alphanumeric() || c == '-' || c == '_',
                "token contains invalid character: {}",
                c
            );
        }
    }

    #[test]
    fn test_generate_token_uniqueness() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_generate_client_secret_length() {
        assert_eq!(generate_client_secret().len(), CLIENT_SECRET_LENGTH);
    }

    #[test]
    fn test_hash_token_deterministic_hex() {
        let token = "test_token_12345";
        let hash = hash_token(token);
        assert_eq!(hash, hash_token(token));
        // SHA-256 hex digest is 64 characters
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash, token);
    }

    #[test]
    fn test_hash_token_distinguishes_inputs() {
        assert_ne!(hash_token(&generate_token()), hash_token(&generate_token()));
    }

    #[test]
    fn test_client_secret_roundtrip() {
        let secret = generate_client_secret();
        let hash = hash_client_secret(&secret).unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_client_secret(&secret, &hash).unwrap());
        assert!(!verify_client_secret("wrong-secret", &hash).unwrap());
    }

    #[test]
    fn test_client_secret_hashes_are_salted() {
        let secret = "same_secret";
        let h1 = hash_client_secret(secret).unwrap();
        let h2 = hash_client_secret(secret).unwrap();
        assert_ne!(h1, h2);
        assert!(verify_client_secret(secret, &h1).unwrap());
        assert!(verify_client_secret(secret, &h2).unwrap());
    }
}
