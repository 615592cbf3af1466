//! Authorization code issuance and the token endpoint grants.
//!
//! Code consumption and refresh rotation each run inside a single database
//! transaction with the affected row locked `FOR UPDATE`, so a code is
//! exchanged at most once and a refresh token rotates at most once; the
//! loser of a race observes the deleted or rotated row and receives
//! `invalid_grant`.

use std::sync::Arc;

use chrono::Utc;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::config::Config;
use crate::dto::oauth::{AuthorizeParams, TokenResponse};
use crate::error::OAuthError;
use crate::models::Client;
use crate::repositories::{AuthorizationCodeRepository, TokenRepository};
use crate::utils::pkce::{
    validate_code_challenge, validate_code_verifier, verify_pkce, PKCE_METHOD_S256,
};
use crate::utils::scopes::{is_scope_subset, join_scope};
use crate::utils::secret::{generate_token, hash_token};

/// Authorization request parameters that survived validation.
#[derive(Debug, Clone)]
pub struct ValidatedAuthorize {
    pub scopes: Vec<String>,
    pub code_challenge: String,
    pub code_challenge_method: String,
}

#[derive(Clone)]
pub struct OAuthService {
    code_repo: AuthorizationCodeRepository,
    pool: MySqlPool,
    config: Arc<Config>,
}

impl OAuthService {
    pub fn new(pool: MySqlPool, config: Arc<Config>) -> Self {
        Self {
            code_repo: AuthorizationCodeRepository::new(pool.clone()),
            pool,
            config,
        }
    }

    // ========================================================================
    // Authorization endpoint
    // ========================================================================

    /// Validate an authorization request against its resolved client.
    ///
    /// The caller has already resolved the client and confirmed the
    /// redirect URI (those two failures have their own response modes);
    /// everything here fails into a redirect error.
    pub fn validate_authorize(
        &self,
        client: &Client,
        params: &AuthorizeParams,
    ) -> Result<ValidatedAuthorize, OAuthError> {
        if params.response_type != "code" {
            return Err(OAuthError::UnsupportedResponseType);
        }

        let scopes = params.scopes();
        if !client.allows_scopes(&scopes) {
            return Err(OAuthError::InvalidScope(
                "one or more requested scopes are not allowed for this client".to_string(),
            ));
        }

        let code_challenge = params
            .code_challenge
            .clone()
            .ok_or_else(|| OAuthError::InvalidRequest("code_challenge is required".to_string()))?;
        if !validate_code_challenge(&code_challenge) {
            return Err(OAuthError::InvalidRequest(
                "malformed code_challenge".to_string(),
            ));
        }

        let method = params
            .code_challenge_method
            .clone()
            .unwrap_or_else(|| PKCE_METHOD_S256.to_string());
        if method != PKCE_METHOD_S256 {
            return Err(OAuthError::InvalidRequest(
                "code_challenge_method must be S256".to_string(),
            ));
        }

        Ok(ValidatedAuthorize {
            scopes,
            code_challenge,
            code_challenge_method: method,
        })
    }

    /// Mint and persist a single-use authorization code after consent.
    pub async fn issue_code(
        &self,
        client: &Client,
        user_id: Uuid,
        redirect_uri: &str,
        validated: &ValidatedAuthorize,
    ) -> Result<String, OAuthError> {
        let code = generate_token();
        let code_hash = hash_token(&code);
        let expires_at = Utc::now() + self.config.auth_code_ttl();

        self.code_repo
            .create(
                &code_hash,
                client.id,
                user_id,
                redirect_uri,
                &join_scope(&validated.scopes),
                &validated.code_challenge,
                &validated.code_challenge_method,
                expires_at,
            )
            .await?;

        tracing::debug!(client_id = %client.client_id, user_id = %user_id, "issued authorization code");

        Ok(code)
    }

    // ========================================================================
    // Token endpoint: authorization_code grant
    // ========================================================================

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(
        &self,
        client: &Client,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthError> {
        if !validate_code_verifier(code_verifier) {
            return Err(OAuthError::InvalidGrant(
                "malformed code_verifier".to_string(),
            ));
        }

        let code_hash = hash_token(code);
        let mut tx = self.pool.begin().await?;

        let auth_code =
            AuthorizationCodeRepository::find_for_update(&mut tx, &code_hash, client.id)
                .await?
                .ok_or_else(|| {
                    OAuthError::InvalidGrant("invalid authorization code".to_string())
                })?;

        if auth_code.is_expired() {
            AuthorizationCodeRepository::delete(&mut tx, auth_code.id).await?;
            tx.commit().await?;
            return Err(OAuthError::InvalidGrant(
                "authorization code has expired".to_string(),
            ));
        }

        if auth_code.redirect_uri != redirect_uri {
            return Err(OAuthError::InvalidGrant(
                "redirect_uri does not match".to_string(),
            ));
        }

        if !verify_pkce(
            code_verifier,
            &auth_code.code_challenge,
            &auth_code.code_challenge_method,
        ) {
            return Err(OAuthError::InvalidGrant(
                "code_verifier does not match code_challenge".to_string(),
            ));
        }

        // Consume the code and mint the pair within the same transaction.
        AuthorizationCodeRepository::delete(&mut tx, auth_code.id).await?;

        let access_token = generate_token();
        let refresh_token = generate_token();
        let now = Utc::now();

        TokenRepository::create(
            &mut tx,
            &hash_token(&access_token),
            &hash_token(&refresh_token),
            client.id,
            auth_code.user_id,
            &auth_code.scope,
            now + self.config.access_token_ttl(),
            now + self.config.refresh_token_ttl(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(client_id = %client.client_id, user_id = %auth_code.user_id, "exchanged authorization code for tokens");

        Ok(TokenResponse::new(
            access_token,
            refresh_token,
            self.config.access_token_expires_in_secs(),
            auth_code.scope,
        ))
    }

    // ========================================================================
    // Token endpoint: refresh_token grant
    // ========================================================================

    /// Rotate a refresh token, optionally narrowing the scope to a subset
    /// of the current grant.
    pub async fn refresh(
        &self,
        client: &Client,
        refresh_token: &str,
        requested_scopes: &[String],
    ) -> Result<TokenResponse, OAuthError> {
        let refresh_hash = hash_token(refresh_token);
        let mut tx = self.pool.begin().await?;

        let token = TokenRepository::find_by_refresh_token_hash_for_update(
            &mut tx,
            &refresh_hash,
            client.id,
        )
        .await?
        .ok_or_else(|| OAuthError::InvalidGrant("invalid refresh token".to_string()))?;

        if token.is_revoked {
            return Err(OAuthError::InvalidGrant(
                "refresh token has been revoked".to_string(),
            ));
        }
        if token.is_refresh_token_expired() {
            return Err(OAuthError::InvalidGrant(
                "refresh token has expired".to_string(),
            ));
        }

        let scope = if requested_scopes.is_empty() {
            token.scope.clone()
        } else {
            if !is_scope_subset(requested_scopes, &token.scopes()) {
                return Err(OAuthError::InvalidScope(
                    "requested scope exceeds the original grant".to_string(),
                ));
            }
            join_scope(requested_scopes)
        };

        let access_token = generate_token();
        let new_refresh_token = generate_token();
        let now = Utc::now();

        TokenRepository::rotate(
            &mut tx,
            token.id,
            &hash_token(&access_token),
            &hash_token(&new_refresh_token),
            &scope,
            now + self.config.access_token_ttl(),
            now + self.config.refresh_token_ttl(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(client_id = %client.client_id, user_id = %token.user_id, "rotated refresh token");

        Ok(TokenResponse::new(
            access_token,
            new_refresh_token,
            self.config.access_token_expires_in_secs(),
            scope,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::pkce::compute_s256_challenge;
    use crate::utils::scopes::parse_scope;
    use chrono::Duration;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            database_url: "mysql://localhost/test".into(),
            server_host: "127.0.0.1".into(),
            server_port: 8001,
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 30,
            auth_code_ttl_minutes: 10,
            valid_scopes: parse_scope("memories:read memories:write profile:read"),
            required_scopes: vec![],
            admin_username: "admin".into(),
            admin_email: "admin@example.com".into(),
            admin_password: "adminpassword".into(),
            maintenance_interval_secs: 300,
        })
    }

    fn test_client() -> Client {
        Client {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4().to_string(),
            client_secret_hash: "$2b$12$hash".into(),
            client_name: "Memory App".into(),
            redirect_uris: vec!["https://app/cb".into()],
            allowed_scopes: parse_scope("memories:read memories:write"),
            is_confidential: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service() -> OAuthService {
        // The pool is never touched by the pure validation paths under test.
        // `connect_lazy` spawns a background maintenance task, which requires an
        // active Tokio context even though the pool itself is never polled here.
        static RT: std::sync::OnceLock<tokio::runtime::Runtime> = std::sync::OnceLock::new();
        let rt = RT.get_or_init(|| tokio::runtime::Runtime::new().unwrap());
        let _guard = rt.enter();
        let pool = MySqlPool::connect_lazy("mysql://localhost/unused").unwrap();
        OAuthService::new(pool, test_config())
    }

    fn params(challenge: Option<&str>, method: Option<&str>) -> AuthorizeParams {
        AuthorizeParams {
            response_type: "code".into(),
            client_id: "c".into(),
            redirect_uri: "https://app/cb".into(),
            scope: Some("memories:read".into()),
            state: Some("xyz".into()),
            code_challenge: challenge.map(String::from),
            code_challenge_method: method.map(String::from),
            user_id: None,
        }
    }

    #[test]
    fn test_validate_authorize_happy_path() {
        let challenge = compute_s256_challenge("a".repeat(43).as_str());
        let validated = service()
            .validate_authorize(&test_client(), &params(Some(&challenge), Some("S256")))
            .unwrap();
        assert_eq!(validated.scopes, vec!["memories:read"]);
        assert_eq!(validated.code_challenge_method, "S256");
    }

    #[test]
    fn test_validate_authorize_defaults_method_to_s256() {
        let challenge = compute_s256_challenge("a".repeat(43).as_str());
        let validated = service()
            .validate_authorize(&test_client(), &params(Some(&challenge), None))
            .unwrap();
        assert_eq!(validated.code_challenge_method, "S256");
    }

    #[test]
    fn test_validate_authorize_rejects_wrong_response_type() {
        let challenge = compute_s256_challenge("a".repeat(43).as_str());
        let mut p = params(Some(&challenge), None);
        p.response_type = "token".into();
        let err = service().validate_authorize(&test_client(), &p).unwrap_err();
        assert_eq!(err.wire_code(), "unsupported_response_type");
    }

    #[test]
    fn test_validate_authorize_rejects_disallowed_scope() {
        let challenge = compute_s256_challenge("a".repeat(43).as_str());
        let mut p = params(Some(&challenge), None);
        p.scope = Some("memories:read profile:read".into());
        let err = service().validate_authorize(&test_client(), &p).unwrap_err();
        assert_eq!(err.wire_code(), "invalid_scope");
    }

    #[test]
    fn test_validate_authorize_requires_challenge() {
        let err = service()
            .validate_authorize(&test_client(), &params(None, None))
            .unwrap_err();
        assert_eq!(err.wire_code(), "invalid_request");
    }

    #[test]
    fn test_validate_authorize_rejects_plain_method() {
        let challenge = compute_s256_challenge("a".repeat(43).as_str());
        let err = service()
            .validate_authorize(&test_client(), &params(Some(&challenge), Some("plain")))
            .unwrap_err();
        assert_eq!(err.wire_code(), "invalid_request");
    }

    #[test]
    fn test_code_ttl_never_exceeds_ten_minutes() {
        let config = test_config();
        assert!(config.auth_code_ttl() <= Duration::minutes(10));
    }
}
