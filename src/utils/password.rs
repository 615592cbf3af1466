//! Password hashing for users and administrators.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::OAuthError;

/// Hash a password using Argon2id, returning a PHC string.
pub fn hash_password(password: &str) -> Result<String, OAuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| OAuthError::ServerError(format!("password hashing failed: {}", e)))
}

/// Verify a password against a stored PHC-format hash.
///
/// Argon2's verifier compares digests in constant time.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, OAuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| OAuthError::ServerError(format!("invalid password hash format: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_phc_string() {
        let hash = hash_password("secure_password123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert_ne!(hash, "secure_password123");
    }

    #[test]
    fn test_verify_password_roundtrip() {
        let hash = hash_password("test_password_123").unwrap();
        assert!(verify_password("test_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_hash_password_different_salts() {
        let h1 = hash_password("same_password").unwrap();
        let h2 = hash_password("same_password").unwrap();
        assert_ne!(h1, h2);
        assert!(verify_password("same_password", &h1).unwrap());
        assert!(verify_password("same_password", &h2).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash_format() {
        assert!(verify_password("test", "not_a_valid_hash").is_err());
    }
}
