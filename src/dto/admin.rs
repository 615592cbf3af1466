//! Administrator client-management DTOs.

use serde::{Deserialize, Serialize};

use crate::models::Client;

fn default_confidential() -> bool {
    true
}

/// JSON body of `POST /api/admin/clients/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistrationRequest {
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    #[serde(default = "default_confidential")]
    pub is_confidential: bool,
}

/// Registration response; the plaintext secret appears here and nowhere
/// else.
#[derive(Debug, Clone, Serialize)]
pub struct ClientRegistrationResponse {
    pub client_id: String,
    pub client_secret: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub is_confidential: bool,
}

/// JSON body of `PUT /api/admin/clients/{client_id}`. Absent fields keep
/// their stored values.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientUpdateRequest {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    pub allowed_scopes: Option<Vec<String>>,
}

/// Public view of a registered client (no secret material).
#[derive(Debug, Clone, Serialize)]
pub struct ClientView {
    pub client_id: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub is_confidential: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Client> for ClientView {
    fn from(client: Client) -> Self {
        Self {
            client_id: client.client_id,
            client_name: client.client_name,
            redirect_uris: client.redirect_uris,
            allowed_scopes: client.allowed_scopes,
            is_confidential: client.is_confidential,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_request_defaults_confidential() {
        let req: ClientRegistrationRequest = serde_json::from_value(serde_json::json!({
            "client_name": "Memory App",
            "redirect_uris": ["https://app/cb"],
            "allowed_scopes": ["memories:read"],
        }))
        .unwrap();
        assert!(req.is_confidential);
    }

    #[test]
    fn test_update_request_partial() {
        let req: ClientUpdateRequest = serde_json::from_value(serde_json::json!({
            "client_name": "Renamed",
        }))
        .unwrap();
        assert_eq!(req.client_name.as_deref(), Some("Renamed"));
        assert!(req.redirect_uris.is_none());
        assert!(req.allowed_scopes.is_none());
    }

    #[test]
    fn test_client_view_has_no_secret_field() {
        let json = serde_json::to_value(ClientView {
            client_id: "c".into(),
            client_name: "Memory App".into(),
            redirect_uris: vec!["https://app/cb".into()],
            allowed_scopes: vec!["memories:read".into()],
            is_confidential: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .unwrap();
        assert!(json.get("client_secret").is_none());
        assert!(json.get("client_secret_hash").is_none());
    }
}
