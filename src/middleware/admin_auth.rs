//! HTTP Basic authentication for administrator endpoints.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::config::AppState;
use crate::error::AdminAuthError;
use crate::models::User;
use crate::repositories::UserRepository;
use crate::utils::password::verify_password;

/// Extractor yielding the authenticated administrator.
///
/// Credentials are verified against the user's argon2 hash; 401 covers a
/// missing header, unknown username or wrong password alike, and 403 is
/// reserved for authenticated non-superusers.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AdminAuthError::InvalidCredentials)?;

        let (username, password) =
            decode_basic(header).ok_or(AdminAuthError::InvalidCredentials)?;

        let user_repo = UserRepository::new(state.pool.clone());
        let user = user_repo
            .find_by_username(&username)
            .await
            .map_err(|e| AdminAuthError::Internal(anyhow::anyhow!(e)))?
            .ok_or(AdminAuthError::InvalidCredentials)?;

        let password_ok = verify_password(&password, &user.hashed_password)
            .map_err(|e| AdminAuthError::Internal(anyhow::anyhow!(e)))?;
        if !password_ok || !user.is_active {
            tracing::warn!(username = %username, "admin authentication failed");
            return Err(AdminAuthError::InvalidCredentials);
        }

        if !user.is_superuser {
            tracing::warn!(username = %username, "admin access denied for non-superuser");
            return Err(AdminAuthError::NotSuperuser);
        }

        Ok(AdminUser(user))
    }
}

/// Decode an `Authorization: Basic` header into (username, password).
fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_basic_valid() {
        // "admin:adminpassword"
        let header = format!("Basic {}", STANDARD.encode("admin:adminpassword"));
        assert_eq!(
            decode_basic(&header),
            Some(("admin".to_string(), "adminpassword".to_string()))
        );
    }

    #[test]
    fn test_decode_basic_password_with_colon() {
        let header = format!("Basic {}", STANDARD.encode("admin:pass:word"));
        assert_eq!(
            decode_basic(&header),
            Some(("admin".to_string(), "pass:word".to_string()))
        );
    }

    #[test]
    fn test_decode_basic_rejects_other_schemes() {
        assert_eq!(decode_basic("Bearer abc"), None);
        assert_eq!(decode_basic("Basic not-base64!"), None);
    }

    #[test]
    fn test_decode_basic_rejects_missing_colon() {
        let header = format!("Basic {}", STANDARD.encode("adminonly"));
        assert_eq!(decode_basic(&header), None);
    }
}
