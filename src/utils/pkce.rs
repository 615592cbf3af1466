//! PKCE (Proof Key for Code Exchange) verification per RFC 7636.
//!
//! Every authorization request must carry an S256 code challenge; the token
//! exchange proves possession of the matching verifier. The `plain` method
//! is not accepted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

/// Minimum length for code_verifier as per RFC 7636
pub const CODE_VERIFIER_MIN_LENGTH: usize = 43;

/// Maximum length for code_verifier as per RFC 7636
pub const CODE_VERIFIER_MAX_LENGTH: usize = 128;

/// The only supported code challenge method
pub const PKCE_METHOD_S256: &str = "S256";

/// Verify a code_verifier against a stored S256 code_challenge.
///
/// Returns `false` for any method other than `S256`.
pub fn verify_pkce(code_verifier: &str, code_challenge: &str, method: &str) -> bool {
    if method != PKCE_METHOD_S256 {
        return false;
    }
    let computed = compute_s256_challenge(code_verifier);
    constant_time_compare(&computed, code_challenge)
}

/// Compute the S256 challenge: BASE64URL(SHA256(code_verifier)) without padding.
pub fn compute_s256_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Validate code_verifier format: 43-128 unreserved URI characters.
pub fn validate_code_verifier(verifier: &str) -> bool {
    let len = verifier.len();
    if !(CODE_VERIFIER_MIN_LENGTH..=CODE_VERIFIER_MAX_LENGTH).contains(&len) {
        return false;
    }
    verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~')
}

/// Validate code_challenge format: exactly 43 base64url characters
/// (a SHA-256 digest is 32 bytes = 43 unpadded base64 characters).
pub fn validate_code_challenge(challenge: &str) -> bool {
    challenge.len() == 43
        && challenge
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Constant-time string comparison to prevent timing attacks
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Known test vector from RFC 7636 Appendix B
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_verify_pkce_s256_valid() {
        assert!(verify_pkce(RFC_VERIFIER, RFC_CHALLENGE, "S256"));
    }

    #[test]
    fn test_verify_pkce_s256_invalid_verifier() {
        let verifier = "wrong_verifier_that_is_long_enough_to_pass_length_check";
        assert!(!verify_pkce(verifier, RFC_CHALLENGE, "S256"));
    }

    #[test]
    fn test_verify_pkce_rejects_plain() {
        let verifier = "my_plain_code_verifier_that_is_at_least_43_chars";
        assert!(!verify_pkce(verifier, verifier, "plain"));
    }

    #[test]
    fn test_verify_pkce_unsupported_method() {
        assert!(!verify_pkce(RFC_VERIFIER, RFC_CHALLENGE, "s256"));
        assert!(!verify_pkce(RFC_VERIFIER, RFC_CHALLENGE, "unsupported"));
    }

    #[test]
    fn test_compute_s256_challenge() {
        assert_eq!(compute_s256_challenge(RFC_VERIFIER), RFC_CHALLENGE);
    }

    #[test]
    fn test_validate_code_verifier_length_bounds() {
        assert!(validate_code_verifier(&"a".repeat(43)));
        assert!(validate_code_verifier(&"a".repeat(128)));
        assert!(!validate_code_verifier(&"a".repeat(42)));
        assert!(!validate_code_verifier(&"a".repeat(129)));
    }

    #[test]
    fn test_validate_code_verifier_invalid_chars() {
        assert!(!validate_code_verifier(
            "abcdefghijklmnopqrstuvwxyz0123456789 abcdef"
        ));
        assert!(!validate_code_verifier(
            "abcdefghijklmnopqrstuvwxyz0123456789+abcdef"
        ));
        assert!(!validate_code_verifier(
            "abcdefghijklmnopqrstuvwxyz0123456789=abcdef"
        ));
    }

    #[test]
    fn test_validate_code_challenge() {
        assert!(validate_code_challenge(RFC_CHALLENGE));
        assert!(!validate_code_challenge(&RFC_CHALLENGE[..42]));
        assert!(!validate_code_challenge(
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw+cM"
        ));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    proptest! {
        #[test]
        fn prop_challenge_agrees_with_its_verifier(verifier in "[A-Za-z0-9._~-]{43,128}") {
            let challenge = compute_s256_challenge(&verifier);
            prop_assert!(validate_code_challenge(&challenge));
            prop_assert!(verify_pkce(&verifier, &challenge, PKCE_METHOD_S256));
        }

        #[test]
        fn prop_distinct_verifiers_do_not_cross_verify(
            a in "[A-Za-z0-9]{43}",
            b in "[A-Za-z0-9]{43}",
        ) {
            prop_assume!(a != b);
            let challenge = compute_s256_challenge(&a);
            prop_assert!(!verify_pkce(&b, &challenge, PKCE_METHOD_S256));
        }
    }
}
