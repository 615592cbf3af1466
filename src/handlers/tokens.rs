//! Token management endpoints: revocation and introspection.
//!
//! Both sit behind the bearer-validation middleware; the presenting token
//! itself must be live.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::AppState;
use crate::dto::oauth::{IntrospectRequest, IntrospectResponse, RevokeRequest};
use crate::error::OAuthError;
use crate::middleware::AuthContext;
use crate::services::RevocationService;

#[derive(Serialize)]
pub struct RevokeResponse {
    pub message: &'static str,
}

/// POST /api/tokens/revoke
///
/// Revokes the given token, or the presenting token when the body names
/// none. Always 200 on well-formed input, even for unknown or
/// already-revoked tokens.
pub async fn revoke_handler(
    State(state): State<AppState>,
    context: AuthContext,
    Json(request): Json<RevokeRequest>,
) -> Result<Json<RevokeResponse>, OAuthError> {
    let service = RevocationService::new(state.pool.clone());

    let token = request.token.as_deref().unwrap_or(&context.token);
    tracing::debug!(user_id = %context.user_id, client_id = %context.client_id, "revocation requested");
    service.revoke(token, request.reason.as_deref()).await?;

    Ok(Json(RevokeResponse {
        message: "Token revoked successfully",
    }))
}

/// POST /api/tokens/introspect
///
/// Returns `{active: false}` for any invalid, expired or blacklisted token;
/// full metadata otherwise.
pub async fn introspect_handler(
    State(state): State<AppState>,
    _context: AuthContext,
    Json(request): Json<IntrospectRequest>,
) -> Result<Json<IntrospectResponse>, OAuthError> {
    let service = RevocationService::new(state.pool.clone());
    let response = service.introspect(&request.token).await?;
    Ok(Json(response))
}
