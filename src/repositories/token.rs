use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, MySqlPool};
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::Token;

const TOKEN_COLUMNS: &str = "id, access_token_hash, refresh_token_hash, client_id, user_id, \
                             scope, access_token_expires_at, refresh_token_expires_at, \
                             is_revoked, created_at, updated_at";

/// Repository for token database operations.
///
/// Rotation and revocation run inside caller-owned transactions with the
/// row locked `FOR UPDATE`; the second of two concurrent rotations of the
/// same refresh token observes the already-rotated hashes and fails.
#[derive(Clone)]
pub struct TokenRepository {
    pool: MySqlPool,
}

impl TokenRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Insert a fresh token pair (already hashed) inside the surrounding
    /// transaction and return the stored row.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        conn: &mut MySqlConnection,
        access_token_hash: &str,
        refresh_token_hash: &str,
        client_id: Uuid,
        user_id: Uuid,
        scope: &str,
        access_token_expires_at: DateTime<Utc>,
        refresh_token_expires_at: DateTime<Utc>,
    ) -> Result<Token, OAuthError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO tokens
            (id, access_token_hash, refresh_token_hash, client_id, user_id, scope,
             access_token_expires_at, refresh_token_expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(access_token_hash)
        .bind(refresh_token_hash)
        .bind(client_id.to_string())
        .bind(user_id.to_string())
        .bind(scope)
        .bind(access_token_expires_at)
        .bind(refresh_token_expires_at)
        .execute(&mut *conn)
        .await?;

        Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| OAuthError::ServerError("failed to fetch created token".to_string()))
    }

    async fn find_by_id(conn: &mut MySqlConnection, id: Uuid) -> Result<Option<Token>, OAuthError> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {} FROM tokens WHERE id = ?",
            TOKEN_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(conn)
        .await?;

        Ok(token)
    }

    pub async fn find_by_access_token_hash(
        &self,
        access_token_hash: &str,
    ) -> Result<Option<Token>, OAuthError> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {} FROM tokens WHERE access_token_hash = ?",
            TOKEN_COLUMNS
        ))
        .bind(access_token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// Find a token by either its access or refresh hash (revocation
    /// accepts both strings).
    pub async fn find_by_either_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Token>, OAuthError> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {} FROM tokens WHERE access_token_hash = ? OR refresh_token_hash = ?",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// Select the token row by refresh hash and lock it for the remainder
    /// of the surrounding transaction.
    pub async fn find_by_refresh_token_hash_for_update(
        conn: &mut MySqlConnection,
        refresh_token_hash: &str,
        client_id: Uuid,
    ) -> Result<Option<Token>, OAuthError> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {} FROM tokens WHERE refresh_token_hash = ? AND client_id = ? FOR UPDATE",
            TOKEN_COLUMNS
        ))
        .bind(refresh_token_hash)
        .bind(client_id.to_string())
        .fetch_optional(conn)
        .await?;

        Ok(token)
    }

    /// Rotate a token pair in place: overwrite both hashes, both expiries
    /// and the (possibly narrowed) scope. The replaced strings never
    /// authenticate again.
    #[allow(clippy::too_many_arguments)]
    pub async fn rotate(
        conn: &mut MySqlConnection,
        id: Uuid,
        access_token_hash: &str,
        refresh_token_hash: &str,
        scope: &str,
        access_token_expires_at: DateTime<Utc>,
        refresh_token_expires_at: DateTime<Utc>,
    ) -> Result<(), OAuthError> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET access_token_hash = ?, refresh_token_hash = ?, scope = ?,
                access_token_expires_at = ?, refresh_token_expires_at = ?
            WHERE id = ? AND is_revoked = false
            "#,
        )
        .bind(access_token_hash)
        .bind(refresh_token_hash)
        .bind(scope)
        .bind(access_token_expires_at)
        .bind(refresh_token_expires_at)
        .bind(id.to_string())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OAuthError::InvalidGrant("refresh token is no longer valid".to_string()));
        }

        Ok(())
    }

    /// Mark a token revoked inside the surrounding transaction.
    pub async fn mark_revoked(conn: &mut MySqlConnection, id: Uuid) -> Result<(), OAuthError> {
        sqlx::query("UPDATE tokens SET is_revoked = true WHERE id = ?")
            .bind(id.to_string())
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Delete tokens whose refresh expiry has passed (cleanup)
    pub async fn delete_expired(&self) -> Result<u64, OAuthError> {
        let result = sqlx::query("DELETE FROM tokens WHERE refresh_token_expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
