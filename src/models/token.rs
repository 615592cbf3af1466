use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::scopes::parse_scope;

/// Issued access/refresh token pair, stored as SHA-256 hashes.
///
/// Refresh rotation overwrites both hashes and expiries in place, so a row
/// always describes the currently valid pair and the replaced strings can
/// never authenticate again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub client_id: Uuid,
    pub user_id: Uuid,
    /// Space-separated scope string carried from the authorization code
    pub scope: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for MySQL query results
#[derive(Debug, Clone, FromRow)]
pub struct TokenRow {
    pub id: String,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub client_id: String,
    pub user_id: String,
    pub scope: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TokenRow> for Token {
    fn from(row: TokenRow) -> Self {
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            access_token_hash: row.access_token_hash,
            refresh_token_hash: row.refresh_token_hash,
            client_id: Uuid::parse_str(&row.client_id).unwrap_or_default(),
            user_id: Uuid::parse_str(&row.user_id).unwrap_or_default(),
            scope: row.scope,
            access_token_expires_at: row.access_token_expires_at,
            refresh_token_expires_at: row.refresh_token_expires_at,
            is_revoked: row.is_revoked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for Token {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let token_row = TokenRow::from_row(row)?;
        Ok(Token::from(token_row))
    }
}

impl Token {
    pub fn is_access_token_expired(&self) -> bool {
        Utc::now() > self.access_token_expires_at
    }

    pub fn is_refresh_token_expired(&self) -> bool {
        Utc::now() > self.refresh_token_expires_at
    }

    /// The granted scopes as a token list.
    pub fn scopes(&self) -> Vec<String> {
        parse_scope(&self.scope)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}
