use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::scopes::scopes_allowed;

/// Registered confidential OAuth client.
///
/// `redirect_uris` and `allowed_scopes` are non-empty; the registry
/// enforces this at registration and update time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret_hash: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub is_confidential: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for MySQL query results
#[derive(Debug, Clone, FromRow)]
pub struct ClientRow {
    pub id: String,
    pub client_id: String,
    pub client_secret_hash: String,
    pub client_name: String,
    pub redirect_uris: serde_json::Value,
    pub allowed_scopes: serde_json::Value,
    pub is_confidential: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        let redirect_uris: Vec<String> =
            serde_json::from_value(row.redirect_uris).unwrap_or_default();
        let allowed_scopes: Vec<String> =
            serde_json::from_value(row.allowed_scopes).unwrap_or_default();

        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            client_id: row.client_id,
            client_secret_hash: row.client_secret_hash,
            client_name: row.client_name,
            redirect_uris,
            allowed_scopes,
            is_confidential: row.is_confidential,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for Client {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let client_row = ClientRow::from_row(row)?;
        Ok(Client::from(client_row))
    }
}

impl Client {
    /// Exact-match check against the registered redirect URIs.
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// True iff every requested scope is in this client's allowed set.
    pub fn allows_scopes(&self, requested: &[String]) -> bool {
        scopes_allowed(requested, &self.allowed_scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4().to_string(),
            client_secret_hash: "$2b$12$hash".into(),
            client_name: "Memory App".into(),
            redirect_uris: vec!["https://app/cb".into()],
            allowed_scopes: vec!["memories:read".into(), "memories:write".into()],
            is_confidential: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_has_redirect_uri_exact_match_only() {
        let c = client();
        assert!(c.has_redirect_uri("https://app/cb"));
        assert!(!c.has_redirect_uri("https://app/cb/"));
        assert!(!c.has_redirect_uri("https://app"));
        assert!(!c.has_redirect_uri("https://evil/cb"));
    }

    #[test]
    fn test_allows_scopes() {
        let c = client();
        assert!(c.allows_scopes(&["memories:read".to_string()]));
        assert!(c.allows_scopes(&[]));
        assert!(!c.allows_scopes(&["memories:delete".to_string()]));
    }
}
