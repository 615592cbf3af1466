use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Revocation blacklist entry. `expires_at` is copied from the revoked
/// token's own expiry, so entries whose token would be rejected anyway can
/// be swept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub id: Uuid,
    pub token_hash: String,
    pub blacklisted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Row type for MySQL query results
#[derive(Debug, Clone, FromRow)]
pub struct BlacklistEntryRow {
    pub id: String,
    pub token_hash: String,
    pub blacklisted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl From<BlacklistEntryRow> for BlacklistEntry {
    fn from(row: BlacklistEntryRow) -> Self {
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            token_hash: row.token_hash,
            blacklisted_at: row.blacklisted_at,
            expires_at: row.expires_at,
            reason: row.reason,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for BlacklistEntry {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let entry_row = BlacklistEntryRow::from_row(row)?;
        Ok(BlacklistEntry::from(entry_row))
    }
}

impl BlacklistEntry {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
