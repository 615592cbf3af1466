use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// RFC 6749 style error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthErrorBody {
    pub fn new(error: &str, description: Option<&str>) -> Self {
        Self {
            error: error.to_string(),
            error_description: description.map(String::from),
        }
    }
}

/// Errors of the OAuth protocol surface.
///
/// Variants map 1:1 onto the wire error codes; `wire_code()` is the single
/// source of truth for the `error` field, used both for JSON bodies and for
/// redirect query parameters on the authorization endpoint.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Client authentication failed")]
    InvalidClient,

    #[error("{0}")]
    InvalidGrant(String),

    #[error("Client is not authorized for this request")]
    UnauthorizedClient,

    #[error("Grant type is not supported")]
    UnsupportedGrantType,

    #[error("Only response_type=code is supported")]
    UnsupportedResponseType,

    #[error("{0}")]
    InvalidScope(String),

    #[error("User denied the authorization request")]
    AccessDenied,

    #[error("User authentication is required")]
    LoginRequired,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Token lacks required scope")]
    InsufficientScope { required: Vec<String> },

    #[error("{0}")]
    ClientRegistrationFailed(String),

    #[error("Internal server error")]
    ServerError(String),
}

impl OAuthError {
    /// The wire `error` code of this variant.
    pub fn wire_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidClient => "invalid_client",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::UnauthorizedClient => "unauthorized_client",
            OAuthError::UnsupportedGrantType => "unsupported_grant_type",
            OAuthError::UnsupportedResponseType => "unsupported_response_type",
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::AccessDenied => "access_denied",
            OAuthError::LoginRequired => "login_required",
            OAuthError::Unauthorized(_) => "unauthorized",
            OAuthError::InsufficientScope { .. } => "insufficient_scope",
            OAuthError::ClientRegistrationFailed(_) => "client_registration_failed",
            OAuthError::ServerError(_) => "server_error",
        }
    }

    /// Human-readable description carried next to the wire code.
    ///
    /// Server faults are not described on the wire; their detail stays in
    /// the log.
    pub fn wire_description(&self) -> Option<String> {
        match self {
            OAuthError::ServerError(_) => None,
            other => Some(other.to_string()),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            OAuthError::InvalidClient | OAuthError::Unauthorized(_) | OAuthError::LoginRequired => {
                StatusCode::UNAUTHORIZED
            }
            OAuthError::AccessDenied | OAuthError::UnauthorizedClient => StatusCode::FORBIDDEN,
            OAuthError::InsufficientScope { .. } => StatusCode::FORBIDDEN,
            OAuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<sqlx::Error> for OAuthError {
    fn from(e: sqlx::Error) -> Self {
        OAuthError::ServerError(format!("database error: {}", e))
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        if let OAuthError::ServerError(detail) = &self {
            tracing::error!(detail = %detail, "server fault");
        }

        let status = self.status();
        let body = OAuthErrorBody::new(self.wire_code(), self.wire_description().as_deref());

        let mut response = (status, Json(body)).into_response();
        match &self {
            OAuthError::Unauthorized(_) | OAuthError::InvalidClient | OAuthError::LoginRequired => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            OAuthError::InsufficientScope { required } => {
                let value = format!("Bearer scope=\"{}\"", required.join(" "));
                if let Ok(value) = HeaderValue::from_str(&value) {
                    response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
                }
            }
            _ => {}
        }
        response
    }
}

/// Errors of the administrator (HTTP Basic) surface.
#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not authorized to access admin endpoints")]
    NotSuperuser,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            AdminAuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AdminAuthError::NotSuperuser => (StatusCode::FORBIDDEN, "forbidden"),
            AdminAuthError::Internal(e) => {
                tracing::error!(detail = %e, "admin auth server fault");
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
            }
        };

        let body = OAuthErrorBody::new(error, Some(&self.to_string()));
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
        }
        response
    }
}

/// Errors of the admin client-management CRUD surface.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Client not found")]
    ClientNotFound,

    #[error(transparent)]
    OAuth(#[from] OAuthError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match self {
            AdminError::ClientNotFound => {
                let body = OAuthErrorBody::new("client_not_found", Some("Client not found"));
                (StatusCode::NOT_FOUND, Json(body)).into_response()
            }
            AdminError::OAuth(e) => e.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_match_taxonomy() {
        assert_eq!(
            OAuthError::InvalidRequest("x".into()).wire_code(),
            "invalid_request"
        );
        assert_eq!(OAuthError::InvalidClient.wire_code(), "invalid_client");
        assert_eq!(
            OAuthError::InvalidGrant("x".into()).wire_code(),
            "invalid_grant"
        );
        assert_eq!(
            OAuthError::UnsupportedGrantType.wire_code(),
            "unsupported_grant_type"
        );
        assert_eq!(
            OAuthError::UnsupportedResponseType.wire_code(),
            "unsupported_response_type"
        );
        assert_eq!(OAuthError::AccessDenied.wire_code(), "access_denied");
        assert_eq!(OAuthError::LoginRequired.wire_code(), "login_required");
        assert_eq!(
            OAuthError::InsufficientScope { required: vec![] }.wire_code(),
            "insufficient_scope"
        );
        assert_eq!(
            OAuthError::ServerError("boom".into()).wire_code(),
            "server_error"
        );
    }

    #[test]
    fn test_server_error_hides_detail() {
        let err = OAuthError::ServerError("connection refused to db at 10.0.0.3".into());
        assert_eq!(err.wire_description(), None);
    }

    #[test]
    fn test_statuses() {
        assert_eq!(
            OAuthError::InvalidGrant("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(OAuthError::InvalidClient.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            OAuthError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            OAuthError::InsufficientScope {
                required: vec!["memories:read".into()]
            }
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            OAuthError::ServerError("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_insufficient_scope_header() {
        let response = OAuthError::InsufficientScope {
            required: vec!["memories:read".into()],
        }
        .into_response();
        let header = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(header, "Bearer scope=\"memories:read\"");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
