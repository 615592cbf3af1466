use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, MySqlPool};
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::BlacklistEntry;

/// Repository for the token revocation blacklist.
#[derive(Clone)]
pub struct BlacklistRepository {
    pool: MySqlPool,
}

impl BlacklistRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Insert a blacklist row inside the surrounding transaction.
    /// Re-revoking the same token refreshes the existing entry.
    pub async fn insert(
        conn: &mut MySqlConnection,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<(), OAuthError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO token_blacklist (id, token_hash, expires_at, reason)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE blacklisted_at = NOW(), reason = VALUES(reason)
            "#,
        )
        .bind(id.to_string())
        .bind(token_hash)
        .bind(expires_at)
        .bind(reason)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn find_by_token_hash(
        conn: &mut MySqlConnection,
        token_hash: &str,
    ) -> Result<Option<BlacklistEntry>, OAuthError> {
        let entry = sqlx::query_as::<_, BlacklistEntry>(
            r#"
            SELECT id, token_hash, blacklisted_at, expires_at, reason
            FROM token_blacklist
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(conn)
        .await?;

        Ok(entry)
    }

    pub async fn delete(conn: &mut MySqlConnection, id: Uuid) -> Result<(), OAuthError> {
        sqlx::query("DELETE FROM token_blacklist WHERE id = ?")
            .bind(id.to_string())
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Delete blacklist rows past their expiry (cleanup)
    pub async fn delete_expired(&self) -> Result<u64, OAuthError> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
