use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::Client;

const CLIENT_COLUMNS: &str = "id, client_id, client_secret_hash, client_name, redirect_uris, \
                              allowed_scopes, is_confidential, created_at, updated_at";

/// Repository for OAuth client database operations
#[derive(Clone)]
pub struct ClientRepository {
    pool: MySqlPool,
}

impl ClientRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create a new client. A duplicate `client_id` surfaces as
    /// `client_registration_failed`.
    pub async fn create(
        &self,
        client_id: &str,
        client_secret_hash: &str,
        client_name: &str,
        redirect_uris: &[String],
        allowed_scopes: &[String],
        is_confidential: bool,
    ) -> Result<Client, OAuthError> {
        let id = Uuid::new_v4();
        let redirect_uris_json = serde_json::to_value(redirect_uris)
            .map_err(|e| OAuthError::ServerError(format!("failed to serialize redirect_uris: {}", e)))?;
        let allowed_scopes_json = serde_json::to_value(allowed_scopes)
            .map_err(|e| OAuthError::ServerError(format!("failed to serialize allowed_scopes: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO oauth_clients
            (id, client_id, client_secret_hash, client_name, redirect_uris, allowed_scopes, is_confidential)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(client_id)
        .bind(client_secret_hash)
        .bind(client_name)
        .bind(&redirect_uris_json)
        .bind(&allowed_scopes_json)
        .bind(is_confidential)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().map(|c| c == "23000").unwrap_or(false)
                    || db_err.message().contains("Duplicate entry")
                {
                    return OAuthError::ClientRegistrationFailed(
                        "client_id already exists".to_string(),
                    );
                }
            }
            OAuthError::from(e)
        })?;

        self.find_by_client_id(client_id)
            .await?
            .ok_or_else(|| OAuthError::ServerError("failed to fetch created client".to_string()))
    }

    pub async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Client>, OAuthError> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM oauth_clients WHERE client_id = ?",
            CLIENT_COLUMNS
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Client>, OAuthError> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM oauth_clients WHERE id = ?",
            CLIENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    /// Update name, redirect URIs and allowed scopes of a client.
    pub async fn update(
        &self,
        client_id: &str,
        client_name: &str,
        redirect_uris: &[String],
        allowed_scopes: &[String],
    ) -> Result<Client, OAuthError> {
        let redirect_uris_json = serde_json::to_value(redirect_uris)
            .map_err(|e| OAuthError::ServerError(format!("failed to serialize redirect_uris: {}", e)))?;
        let allowed_scopes_json = serde_json::to_value(allowed_scopes)
            .map_err(|e| OAuthError::ServerError(format!("failed to serialize allowed_scopes: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE oauth_clients
            SET client_name = ?, redirect_uris = ?, allowed_scopes = ?
            WHERE client_id = ?
            "#,
        )
        .bind(client_name)
        .bind(&redirect_uris_json)
        .bind(&allowed_scopes_json)
        .bind(client_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OAuthError::InvalidClient);
        }

        self.find_by_client_id(client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)
    }

    pub async fn delete(&self, client_id: &str) -> Result<(), OAuthError> {
        let result = sqlx::query("DELETE FROM oauth_clients WHERE client_id = ?")
            .bind(client_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(OAuthError::InvalidClient);
        }

        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<Client>, OAuthError> {
        let clients = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM oauth_clients ORDER BY created_at DESC",
            CLIENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }
}
