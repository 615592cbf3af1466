//! Administrator client-management endpoints, guarded by HTTP Basic
//! credentials of a superuser.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::config::AppState;
use crate::dto::admin::{
    ClientRegistrationRequest, ClientRegistrationResponse, ClientUpdateRequest, ClientView,
};
use crate::error::{AdminError, OAuthError};
use crate::middleware::AdminUser;
use crate::services::ClientRegistry;

/// POST /api/admin/clients/register
pub async fn register_client_handler(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<ClientRegistrationRequest>,
) -> Result<(StatusCode, Json<ClientRegistrationResponse>), OAuthError> {
    let registry = ClientRegistry::new(state.pool.clone(), state.config.clone());
    let (client, client_secret) = registry.register(&request).await?;

    tracing::info!(admin = %admin.username, client_id = %client.client_id, "client registered by administrator");

    Ok((
        StatusCode::CREATED,
        Json(ClientRegistrationResponse {
            client_id: client.client_id,
            // Plain text, returned exactly once
            client_secret,
            client_name: client.client_name,
            redirect_uris: client.redirect_uris,
            allowed_scopes: client.allowed_scopes,
            is_confidential: client.is_confidential,
        }),
    ))
}

/// GET /api/admin/clients
pub async fn list_clients_handler(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<ClientView>>, OAuthError> {
    let registry = ClientRegistry::new(state.pool.clone(), state.config.clone());
    let clients = registry.list().await?;
    Ok(Json(clients.into_iter().map(ClientView::from).collect()))
}

/// GET /api/admin/clients/{client_id}
pub async fn get_client_handler(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(client_id): Path<String>,
) -> Result<Json<ClientView>, AdminError> {
    let registry = ClientRegistry::new(state.pool.clone(), state.config.clone());
    let client = registry
        .get(&client_id)
        .await
        .map_err(AdminError::OAuth)?
        .ok_or(AdminError::ClientNotFound)?;
    Ok(Json(ClientView::from(client)))
}

/// PUT /api/admin/clients/{client_id}
pub async fn update_client_handler(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(client_id): Path<String>,
    Json(patch): Json<ClientUpdateRequest>,
) -> Result<Json<ClientView>, AdminError> {
    let registry = ClientRegistry::new(state.pool.clone(), state.config.clone());

    if registry.get(&client_id).await.map_err(AdminError::OAuth)?.is_none() {
        return Err(AdminError::ClientNotFound);
    }

    let client = registry
        .update(&client_id, &patch)
        .await
        .map_err(AdminError::OAuth)?;

    tracing::info!(admin = %admin.username, client_id = %client_id, "client updated by administrator");

    Ok(Json(ClientView::from(client)))
}

/// DELETE /api/admin/clients/{client_id}
pub async fn delete_client_handler(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(client_id): Path<String>,
) -> Result<StatusCode, AdminError> {
    let registry = ClientRegistry::new(state.pool.clone(), state.config.clone());

    if registry.get(&client_id).await.map_err(AdminError::OAuth)?.is_none() {
        return Err(AdminError::ClientNotFound);
    }

    registry
        .delete(&client_id)
        .await
        .map_err(AdminError::OAuth)?;

    tracing::info!(admin = %admin.username, client_id = %client_id, "client deleted by administrator");

    Ok(StatusCode::NO_CONTENT)
}
