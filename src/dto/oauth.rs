//! OAuth2 request/response DTOs following RFC 6749 and RFC 7636.

use serde::{Deserialize, Serialize};

use crate::utils::scopes::parse_scope;

// ============================================================================
// Authorization endpoint
// ============================================================================

/// Query parameters of `GET /api/oauth/authorize`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// Defaults to S256 when absent
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// Development fallback for the session authenticator
    #[serde(default)]
    pub user_id: Option<String>,
}

impl AuthorizeParams {
    pub fn scopes(&self) -> Vec<String> {
        self.scope.as_deref().map(parse_scope).unwrap_or_default()
    }
}

/// Form body of `POST /api/oauth/consent`: the authorization parameters
/// round-tripped through hidden fields, plus the user's decision.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentForm {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    pub code_challenge: String,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// Carried through the consent form so the decision can be tied back
    /// to the authenticated user
    #[serde(default)]
    pub user_id: Option<String>,
    /// `approve` or `deny`
    pub decision: String,
}

impl ConsentForm {
    pub fn scopes(&self) -> Vec<String> {
        self.scope.as_deref().map(parse_scope).unwrap_or_default()
    }

    pub fn approved(&self) -> bool {
        self.decision == "approve"
    }
}

// ============================================================================
// Token endpoint
// ============================================================================

/// Form body of `POST /api/oauth/token`, covering both grant types.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    /// Optional scope narrowing on refresh
    pub scope: Option<String>,
}

impl TokenRequest {
    pub fn scopes(&self) -> Vec<String> {
        self.scope.as_deref().map(parse_scope).unwrap_or_default()
    }
}

/// Success body of `POST /api/oauth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    /// Space-separated granted scopes
    pub scope: String,
}

impl TokenResponse {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            expires_in,
            refresh_token,
            scope,
        }
    }
}

// ============================================================================
// Revocation and introspection
// ============================================================================

/// JSON body of `POST /api/tokens/revoke`. With `token` omitted, the
/// presenting bearer token is revoked.
#[derive(Debug, Clone, Deserialize)]
pub struct RevokeRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// JSON body of `POST /api/tokens/introspect`.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectRequest {
    pub token: String,
}

/// RFC 7662 style introspection response. Everything except `active` is
/// omitted for tokens that fail validation, so callers learn nothing about
/// why a token is inactive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl IntrospectResponse {
    pub fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            user_id: None,
            exp: None,
        }
    }

    pub fn active(scope: String, client_id: String, user_id: String, exp: i64) -> Self {
        Self {
            active: true,
            scope: Some(scope),
            client_id: Some(client_id),
            user_id: Some(user_id),
            exp: Some(exp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_params_scopes() {
        let params = AuthorizeParams {
            response_type: "code".into(),
            client_id: "c".into(),
            redirect_uri: "https://app/cb".into(),
            scope: Some("memories:read profile:read".into()),
            state: Some("xyz".into()),
            code_challenge: Some("ch".into()),
            code_challenge_method: None,
            user_id: None,
        };
        assert_eq!(params.scopes(), vec!["memories:read", "profile:read"]);
    }

    #[test]
    fn test_consent_form_decision() {
        let mut form = ConsentForm {
            response_type: "code".into(),
            client_id: "c".into(),
            redirect_uri: "https://app/cb".into(),
            scope: None,
            state: None,
            code_challenge: "ch".into(),
            code_challenge_method: Some("S256".into()),
            user_id: None,
            decision: "approve".into(),
        };
        assert!(form.approved());
        form.decision = "deny".into();
        assert!(!form.approved());
        form.decision = "APPROVE".into();
        assert!(!form.approved());
    }

    #[test]
    fn test_token_request_form_decode() {
        let body = "grant_type=authorization_code&code=K&redirect_uri=https%3A%2F%2Fapp%2Fcb\
                    &client_id=C&client_secret=S&code_verifier=V";
        let req: TokenRequest = serde_urlencoded::from_str(body).unwrap();
        assert_eq!(req.grant_type, "authorization_code");
        assert_eq!(req.code.as_deref(), Some("K"));
        assert_eq!(req.redirect_uri.as_deref(), Some("https://app/cb"));
        assert!(req.refresh_token.is_none());
    }

    #[test]
    fn test_token_response_shape() {
        let response = TokenResponse::new("at".into(), "rt".into(), 3600, "memories:read".into());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token_type"], "bearer");
        assert_eq!(json["expires_in"], 3600);
        assert_eq!(json["scope"], "memories:read");
    }

    #[test]
    fn test_introspect_inactive_omits_fields() {
        let json = serde_json::to_value(IntrospectResponse::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({ "active": false }));
    }

    #[test]
    fn test_introspect_active_fields() {
        let response =
            IntrospectResponse::active("memories:read".into(), "C".into(), "U".into(), 1234);
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["active"], true);
        assert_eq!(json["client_id"], "C");
        assert_eq!(json["exp"], 1234);
    }
}
