//! OAuth2 protocol endpoints.
//!
//! - `GET  /api/oauth/authorize`: validate the request, authenticate the
//!   user, render the consent page.
//! - `POST /api/oauth/consent`: turn an approval into a single-use code
//!   and redirect back to the client.
//! - `POST /api/oauth/token`: authorization_code and refresh_token grants.
//!
//! Error responses to the authorization endpoint are 302 redirects carrying
//! `error`, `error_description` and the verbatim `state`, unless the
//! redirect URI itself failed validation, in which case a direct 400 is
//! returned so nothing is exfiltrated to an arbitrary URL.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};

use crate::config::AppState;
use crate::dto::oauth::{AuthorizeParams, ConsentForm, TokenRequest, TokenResponse};
use crate::error::OAuthError;
use crate::models::{Client, User};
use crate::services::{ClientRegistry, OAuthService, SessionAuthenticator, ValidatedAuthorize};

/// GET /api/oauth/authorize
pub async fn authorize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let registry = ClientRegistry::new(state.pool.clone(), state.config.clone());
    let oauth = OAuthService::new(state.pool.clone(), state.config.clone());

    let (client, validated) = match validate_authorize_request(&registry, &oauth, &params).await {
        Ok(ok) => ok,
        Err(AuthorizeReject::Direct(e)) => return e.into_response(),
        Err(AuthorizeReject::Redirect(e)) => {
            return error_redirect(&params.redirect_uri, &e, params.state.as_deref());
        }
    };

    let user = match resolve_session_user(&state, &headers, params.user_id.as_deref()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return error_redirect(
                &params.redirect_uri,
                &OAuthError::LoginRequired,
                params.state.as_deref(),
            );
        }
        Err(e) => return error_redirect(&params.redirect_uri, &e, params.state.as_deref()),
    };

    Html(render_consent_page(&client, &user, &params, &validated)).into_response()
}

/// POST /api/oauth/consent
pub async fn consent_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ConsentForm>,
) -> Response {
    let registry = ClientRegistry::new(state.pool.clone(), state.config.clone());
    let oauth = OAuthService::new(state.pool.clone(), state.config.clone());

    let params = form_as_params(&form);
    let (client, validated) = match validate_authorize_request(&registry, &oauth, &params).await {
        Ok(ok) => ok,
        Err(AuthorizeReject::Direct(e)) => return e.into_response(),
        Err(AuthorizeReject::Redirect(e)) => {
            return error_redirect(&form.redirect_uri, &e, form.state.as_deref());
        }
    };

    let user = match resolve_session_user(&state, &headers, form.user_id.as_deref()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return error_redirect(
                &form.redirect_uri,
                &OAuthError::LoginRequired,
                form.state.as_deref(),
            );
        }
        Err(e) => return error_redirect(&form.redirect_uri, &e, form.state.as_deref()),
    };

    if !form.approved() {
        tracing::info!(client_id = %client.client_id, user_id = %user.id, "consent denied");
        return error_redirect(
            &form.redirect_uri,
            &OAuthError::AccessDenied,
            form.state.as_deref(),
        );
    }

    let code = match oauth
        .issue_code(&client, user.id, &form.redirect_uri, &validated)
        .await
    {
        Ok(code) => code,
        Err(e) => return error_redirect(&form.redirect_uri, &e, form.state.as_deref()),
    };

    let mut query = vec![("code", code)];
    if let Some(state_param) = &form.state {
        query.push(("state", state_param.clone()));
    }
    found_redirect(&append_query(&form.redirect_uri, &query))
}

/// POST /api/oauth/token
pub async fn token_handler(
    State(state): State<AppState>,
    Form(request): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, OAuthError> {
    let registry = ClientRegistry::new(state.pool.clone(), state.config.clone());
    let oauth = OAuthService::new(state.pool.clone(), state.config.clone());

    // Common pre-checks: confidential clients authenticate on every call.
    let client_id = request
        .client_id
        .as_deref()
        .ok_or_else(|| OAuthError::InvalidRequest("client_id is required".to_string()))?;
    let client_secret = request.client_secret.as_deref().ok_or(OAuthError::InvalidClient)?;
    let client = registry.authenticate(client_id, client_secret).await?;

    let response = match request.grant_type.as_str() {
        "authorization_code" => {
            let code = request
                .code
                .as_deref()
                .ok_or_else(|| OAuthError::InvalidRequest("code is required".to_string()))?;
            let redirect_uri = request.redirect_uri.as_deref().ok_or_else(|| {
                OAuthError::InvalidRequest("redirect_uri is required".to_string())
            })?;
            let code_verifier = request.code_verifier.as_deref().ok_or_else(|| {
                OAuthError::InvalidRequest("code_verifier is required".to_string())
            })?;

            oauth
                .exchange_code(&client, code, redirect_uri, code_verifier)
                .await?
        }
        "refresh_token" => {
            let refresh_token = request.refresh_token.as_deref().ok_or_else(|| {
                OAuthError::InvalidRequest("refresh_token is required".to_string())
            })?;

            oauth
                .refresh(&client, refresh_token, &request.scopes())
                .await?
        }
        _ => return Err(OAuthError::UnsupportedGrantType),
    };

    Ok(Json(response))
}

// ============================================================================
// Authorization request validation plumbing
// ============================================================================

/// How a failed authorization request is answered: direct 400 when the
/// redirect URI cannot be trusted, redirect error otherwise.
enum AuthorizeReject {
    Direct(OAuthError),
    Redirect(OAuthError),
}

async fn validate_authorize_request(
    registry: &ClientRegistry,
    oauth: &OAuthService,
    params: &AuthorizeParams,
) -> Result<(Client, ValidatedAuthorize), AuthorizeReject> {
    if params.response_type != "code" {
        return Err(AuthorizeReject::Redirect(OAuthError::UnsupportedResponseType));
    }

    let client = match registry.get(&params.client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => return Err(AuthorizeReject::Redirect(OAuthError::InvalidClient)),
        Err(e) => return Err(AuthorizeReject::Redirect(e)),
    };

    // Never redirect to a URI the client did not register.
    if !client.has_redirect_uri(&params.redirect_uri) {
        return Err(AuthorizeReject::Direct(OAuthError::InvalidRequest(
            "redirect_uri does not match any registered URI".to_string(),
        )));
    }

    let validated = oauth
        .validate_authorize(&client, params)
        .map_err(AuthorizeReject::Redirect)?;

    Ok((client, validated))
}

async fn resolve_session_user(
    state: &AppState,
    headers: &HeaderMap,
    user_id_param: Option<&str>,
) -> Result<Option<User>, OAuthError> {
    let authenticator = SessionAuthenticator::new(state.pool.clone());
    authenticator.resolve_user(headers, user_id_param).await
}

fn form_as_params(form: &ConsentForm) -> AuthorizeParams {
    AuthorizeParams {
        response_type: form.response_type.clone(),
        client_id: form.client_id.clone(),
        redirect_uri: form.redirect_uri.clone(),
        scope: form.scope.clone(),
        state: form.state.clone(),
        code_challenge: Some(form.code_challenge.clone()),
        code_challenge_method: form.code_challenge_method.clone(),
        user_id: form.user_id.clone(),
    }
}

// ============================================================================
// Redirect and rendering helpers
// ============================================================================

/// 302 redirect; axum's `Redirect` emits 303/307, the OAuth responses here
/// are specified as 302 Found.
fn found_redirect(url: &str) -> Response {
    match HeaderValue::from_str(url) {
        Ok(location) => {
            let mut response = StatusCode::FOUND.into_response();
            response.headers_mut().insert(header::LOCATION, location);
            response
        }
        Err(_) => OAuthError::ServerError("invalid redirect location".to_string()).into_response(),
    }
}

/// Append query parameters to a redirect URI, URL-encoding the values.
fn append_query(redirect_uri: &str, pairs: &[(&str, String)]) -> String {
    let mut url = redirect_uri.to_string();
    for (key, value) in pairs {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}

/// Build the error redirect: `error`, `error_description` and the verbatim
/// `state` from the request.
fn error_redirect(redirect_uri: &str, error: &OAuthError, state: Option<&str>) -> Response {
    let mut pairs = vec![("error", error.wire_code().to_string())];
    if let Some(description) = error.wire_description() {
        pairs.push(("error_description", description));
    }
    if let Some(state) = state {
        pairs.push(("state", state.to_string()));
    }
    found_redirect(&append_query(redirect_uri, &pairs))
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Server-rendered consent page: client name, scope descriptions, and the
/// authorization parameters round-tripped through hidden fields.
fn render_consent_page(
    client: &Client,
    user: &User,
    params: &AuthorizeParams,
    validated: &ValidatedAuthorize,
) -> String {
    use crate::utils::scopes::describe_scope;

    let scope_items: String = validated
        .scopes
        .iter()
        .map(|s| {
            format!(
                "      <li><code>{}</code> &mdash; {}</li>\n",
                html_escape(s),
                html_escape(&describe_scope(s))
            )
        })
        .collect();

    let hidden_fields = [
        ("response_type", Some(params.response_type.as_str())),
        ("client_id", Some(params.client_id.as_str())),
        ("redirect_uri", Some(params.redirect_uri.as_str())),
        ("scope", params.scope.as_deref()),
        ("state", params.state.as_deref()),
        ("code_challenge", Some(validated.code_challenge.as_str())),
        (
            "code_challenge_method",
            Some(validated.code_challenge_method.as_str()),
        ),
        ("user_id", params.user_id.as_deref()),
    ]
    .iter()
    .filter_map(|(name, value)| {
        value.map(|v| {
            format!(
                "      <input type=\"hidden\" name=\"{}\" value=\"{}\">\n",
                name,
                html_escape(v)
            )
        })
    })
    .collect::<String>();

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>Authorize {client_name}</title>
  </head>
  <body>
    <h1>Authorize {client_name}</h1>
    <p><strong>{client_name}</strong> is requesting access to your account ({username}):</p>
    <ul>
{scope_items}    </ul>
    <form method="post" action="/api/oauth/consent">
{hidden_fields}      <button type="submit" name="decision" value="approve">Approve</button>
      <button type="submit" name="decision" value="deny">Deny</button>
    </form>
  </body>
</html>
"#,
        client_name = html_escape(&client.client_name),
        username = html_escape(&user.username),
        scope_items = scope_items,
        hidden_fields = hidden_fields,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_append_query_first_and_subsequent() {
        let url = append_query("https://app/cb", &[("code", "K".to_string())]);
        assert_eq!(url, "https://app/cb?code=K");

        let url = append_query(&url, &[("state", "xyz".to_string())]);
        assert_eq!(url, "https://app/cb?code=K&state=xyz");
    }

    #[test]
    fn test_append_query_encodes_values() {
        let url = append_query(
            "https://app/cb",
            &[("state", "a b&c=d".to_string())],
        );
        assert_eq!(url, "https://app/cb?state=a%20b%26c%3Dd");
    }

    #[test]
    fn test_error_redirect_echoes_state() {
        let response = error_redirect("https://app/cb", &OAuthError::AccessDenied, Some("xyz"));
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(location.starts_with("https://app/cb?error=access_denied"));
        assert!(location.contains("&state=xyz"));
    }

    #[test]
    fn test_error_redirect_without_state() {
        let response = error_redirect("https://app/cb", &OAuthError::LoginRequired, None);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(location.contains("error=login_required"));
        assert!(!location.contains("state="));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<b>&"x"'y'</b>"#),
            "&lt;b&gt;&amp;&quot;x&quot;&#x27;y&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_consent_page_round_trips_parameters() {
        let client = Client {
            id: Uuid::new_v4(),
            client_id: "client-1".into(),
            client_secret_hash: "$2b$12$hash".into(),
            client_name: "Memory <App>".into(),
            redirect_uris: vec!["https://app/cb".into()],
            allowed_scopes: vec!["memories:read".into()],
            is_confidential: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let user = User {
            id: Uuid::new_v4(),
            email: "u@example.com".into(),
            username: "u".into(),
            hashed_password: "$argon2id$hash".into(),
            is_active: true,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let params = AuthorizeParams {
            response_type: "code".into(),
            client_id: "client-1".into(),
            redirect_uri: "https://app/cb".into(),
            scope: Some("memories:read".into()),
            state: Some("xy&z".into()),
            code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".into()),
            code_challenge_method: Some("S256".into()),
            user_id: None,
        };
        let validated = ValidatedAuthorize {
            scopes: vec!["memories:read".into()],
            code_challenge: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".into(),
            code_challenge_method: "S256".into(),
        };

        let page = render_consent_page(&client, &user, &params, &validated);
        assert!(page.contains("Memory &lt;App&gt;"));
        assert!(page.contains("Read your memories"));
        assert!(page.contains("name=\"state\" value=\"xy&amp;z\""));
        assert!(page.contains("name=\"code_challenge\""));
        assert!(page.contains("value=\"approve\""));
        assert!(page.contains("value=\"deny\""));
        assert!(!page.contains("client_secret"));
    }
}
