use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, MySqlPool};
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::AuthorizationCode;

const CODE_COLUMNS: &str = "id, code_hash, client_id, user_id, redirect_uri, scope, \
                            code_challenge, code_challenge_method, expires_at, created_at";

/// Repository for authorization code database operations.
///
/// Consumption runs inside a caller-owned transaction: the row is selected
/// `FOR UPDATE` and deleted before the token insert, so a concurrent
/// exchange of the same code blocks on the lock and then finds nothing.
#[derive(Clone)]
pub struct AuthorizationCodeRepository {
    pool: MySqlPool,
}

impl AuthorizationCodeRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Persist a freshly minted code (already hashed).
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        code_hash: &str,
        client_id: Uuid,
        user_id: Uuid,
        redirect_uri: &str,
        scope: &str,
        code_challenge: &str,
        code_challenge_method: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), OAuthError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO authorization_codes
            (id, code_hash, client_id, user_id, redirect_uri, scope, code_challenge, code_challenge_method, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(code_hash)
        .bind(client_id.to_string())
        .bind(user_id.to_string())
        .bind(redirect_uri)
        .bind(scope)
        .bind(code_challenge)
        .bind(code_challenge_method)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Select the code row for this client and lock it for the remainder of
    /// the surrounding transaction.
    pub async fn find_for_update(
        conn: &mut MySqlConnection,
        code_hash: &str,
        client_id: Uuid,
    ) -> Result<Option<AuthorizationCode>, OAuthError> {
        let code = sqlx::query_as::<_, AuthorizationCode>(&format!(
            "SELECT {} FROM authorization_codes WHERE code_hash = ? AND client_id = ? FOR UPDATE",
            CODE_COLUMNS
        ))
        .bind(code_hash)
        .bind(client_id.to_string())
        .fetch_optional(conn)
        .await?;

        Ok(code)
    }

    /// Delete a code row inside the surrounding transaction.
    pub async fn delete(conn: &mut MySqlConnection, id: Uuid) -> Result<(), OAuthError> {
        sqlx::query("DELETE FROM authorization_codes WHERE id = ?")
            .bind(id.to_string())
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Delete expired authorization codes (cleanup)
    pub async fn delete_expired(&self) -> Result<u64, OAuthError> {
        let result = sqlx::query("DELETE FROM authorization_codes WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
