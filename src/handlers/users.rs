//! Scope-guarded resource endpoint.
//!
//! The memory API proper lives elsewhere; this profile view demonstrates
//! the contract resource handlers rely on: bearer validation has already
//! run, and the route sits behind a `profile:read` scope guard.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::AppState;
use crate::error::OAuthError;
use crate::middleware::AuthContext;
use crate::repositories::UserRepository;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub sub: String,
    pub username: String,
    pub email: String,
    /// Space-separated scopes the presenting token carries
    pub scope: String,
}

/// GET /api/users/me
pub async fn me_handler(
    State(state): State<AppState>,
    context: AuthContext,
) -> Result<Json<ProfileResponse>, OAuthError> {
    let user_repo = UserRepository::new(state.pool.clone());
    let user = user_repo
        .find_active_by_id(context.user_id)
        .await?
        .ok_or_else(|| OAuthError::Unauthorized("user is not available".to_string()))?;

    Ok(Json(ProfileResponse {
        sub: user.id.to_string(),
        username: user.username,
        email: user.email,
        scope: context.scopes.join(" "),
    }))
}
