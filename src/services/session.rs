//! Session authenticator: resolve which user is present on an
//! authorization-endpoint request.
//!
//! Two sources are consulted in order: a `session_token` cookie holding an
//! access token issued by this server, and a `user_id` parameter carried by
//! development flows. Only active users resolve; anything else means the
//! authorization endpoint answers `login_required`.

use axum::http::{header, HeaderMap};
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::User;
use crate::repositories::{TokenRepository, UserRepository};
use crate::utils::secret::hash_token;

pub const SESSION_COOKIE: &str = "session_token";

#[derive(Clone)]
pub struct SessionAuthenticator {
    user_repo: UserRepository,
    token_repo: TokenRepository,
}

impl SessionAuthenticator {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            user_repo: UserRepository::new(pool.clone()),
            token_repo: TokenRepository::new(pool),
        }
    }

    /// Resolve the current user from request headers, falling back to an
    /// explicit user id parameter.
    pub async fn resolve_user(
        &self,
        headers: &HeaderMap,
        user_id_param: Option<&str>,
    ) -> Result<Option<User>, OAuthError> {
        if let Some(session_token) = extract_cookie(headers, SESSION_COOKIE) {
            if let Some(user) = self.resolve_session_token(&session_token).await? {
                return Ok(Some(user));
            }
        }

        if let Some(raw_id) = user_id_param {
            if let Ok(user_id) = Uuid::parse_str(raw_id) {
                return self.user_repo.find_active_by_id(user_id).await;
            }
        }

        Ok(None)
    }

    async fn resolve_session_token(&self, session_token: &str) -> Result<Option<User>, OAuthError> {
        let token_hash = hash_token(session_token);
        let Some(token) = self.token_repo.find_by_access_token_hash(&token_hash).await? else {
            return Ok(None);
        };

        if token.is_revoked || token.is_access_token_expired() {
            return Ok(None);
        }

        self.user_repo.find_active_by_id(token.user_id).await
    }
}

/// Pull a named cookie out of the `Cookie` header.
fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        if key == name {
            return parts.next().map(|v| v.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_cookie_single() {
        let headers = headers_with_cookie("session_token=abc123");
        assert_eq!(
            extract_cookie(&headers, SESSION_COOKIE),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_extract_cookie_among_others() {
        let headers = headers_with_cookie("theme=dark; session_token=tok; lang=en");
        assert_eq!(
            extract_cookie(&headers, SESSION_COOKIE),
            Some("tok".to_string())
        );
    }

    #[test]
    fn test_extract_cookie_absent() {
        let headers = headers_with_cookie("theme=dark");
        assert_eq!(extract_cookie(&headers, SESSION_COOKIE), None);
        assert_eq!(extract_cookie(&HeaderMap::new(), SESSION_COOKIE), None);
    }

    #[test]
    fn test_extract_cookie_does_not_match_prefix() {
        let headers = headers_with_cookie("session_token_old=abc");
        assert_eq!(extract_cookie(&headers, SESSION_COOKIE), None);
    }
}
