//! Bearer-token validation and scope enforcement.
//!
//! Every request outside the public allow-list must present
//! `Authorization: Bearer <token>`. The token is resolved by hash, checked
//! for revocation, expiry and blacklist membership, and the resulting
//! [`AuthContext`] is injected into request extensions for handlers and
//! scope guards.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::config::AppState;
use crate::error::OAuthError;
use crate::repositories::TokenRepository;
use crate::services::RevocationService;
use crate::utils::secret::hash_token;

/// Paths exempt from bearer validation: health probes, the OAuth endpoints
/// themselves (they authenticate by other means), the admin surface (HTTP
/// Basic), static assets and API documentation.
const PUBLIC_PATH_PREFIXES: &[&str] = &[
    "/health",
    "/ready",
    "/api/oauth/",
    "/api/admin/",
    "/static",
    "/docs",
];

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATH_PREFIXES
        .iter()
        .any(|prefix| path == prefix.trim_end_matches('/') || path.starts_with(prefix))
}

/// Request-scoped authentication state, passed to handlers explicitly via
/// extensions rather than mutable request attributes.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub scopes: Vec<String>,
    /// The presenting token itself, needed when revoking "self".
    pub token: String,
}

impl AuthContext {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn has_all_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|s| self.scopes.contains(s))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = OAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| OAuthError::Unauthorized("missing bearer token".to_string()))
    }
}

/// Validate the bearer token on every non-public request.
pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, OAuthError> {
    if is_public_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = extract_bearer(&request)
        .ok_or_else(|| OAuthError::Unauthorized("missing or invalid token".to_string()))?;
    let token_hash = hash_token(&token);

    let token_repo = TokenRepository::new(state.pool.clone());
    let stored = token_repo
        .find_by_access_token_hash(&token_hash)
        .await?
        .ok_or_else(|| OAuthError::Unauthorized("token is invalid or expired".to_string()))?;

    if stored.is_revoked || stored.is_access_token_expired() {
        return Err(OAuthError::Unauthorized(
            "token is invalid or expired".to_string(),
        ));
    }

    let revocation = RevocationService::new(state.pool.clone());
    if revocation.is_blacklisted(&token_hash).await? {
        return Err(OAuthError::Unauthorized(
            "token has been revoked".to_string(),
        ));
    }

    request.extensions_mut().insert(AuthContext {
        user_id: stored.user_id,
        client_id: stored.client_id,
        scopes: stored.scopes(),
        token,
    });

    Ok(next.run(request).await)
}

fn extract_bearer(request: &Request<Body>) -> Option<String> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Per-route scope guard factory. The wrapped routes must sit behind
/// [`bearer_auth_middleware`]; a missing context is a 401, a missing scope
/// a 403 carrying `WWW-Authenticate: Bearer scope="…"`.
pub fn require_scopes(
    required: &[&str],
) -> impl Fn(
    Request<Body>,
    Next,
) -> std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<Response, OAuthError>> + Send>,
> + Clone
       + Send
       + 'static {
    let required: Vec<String> = required.iter().map(|s| s.to_string()).collect();
    move |request: Request<Body>, next: Next| {
        let required = required.clone();
        Box::pin(async move {
            let context = request
                .extensions()
                .get::<AuthContext>()
                .ok_or_else(|| OAuthError::Unauthorized("missing bearer token".to_string()))?;

            if !context.has_all_scopes(&required) {
                return Err(OAuthError::InsufficientScope { required });
            }

            Ok(next.run(request).await)
        })
    }
}
