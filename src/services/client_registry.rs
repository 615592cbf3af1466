//! Client registry: registration, metadata validation and authentication
//! of confidential clients.

use std::sync::Arc;

use sqlx::MySqlPool;
use uuid::Uuid;

use crate::config::Config;
use crate::dto::admin::{ClientRegistrationRequest, ClientUpdateRequest};
use crate::error::OAuthError;
use crate::models::Client;
use crate::repositories::ClientRepository;
use crate::utils::scopes::{is_valid_scope_token, scopes_allowed};
use crate::utils::secret::{generate_client_secret, hash_client_secret, verify_client_secret};

#[derive(Clone)]
pub struct ClientRegistry {
    client_repo: ClientRepository,
    config: Arc<Config>,
}

impl ClientRegistry {
    pub fn new(pool: MySqlPool, config: Arc<Config>) -> Self {
        Self {
            client_repo: ClientRepository::new(pool),
            config,
        }
    }

    /// Register a new confidential client.
    ///
    /// Returns the stored client together with the plaintext secret, which
    /// is shown exactly once in the registration response.
    pub async fn register(
        &self,
        request: &ClientRegistrationRequest,
    ) -> Result<(Client, String), OAuthError> {
        self.validate_metadata(&request.redirect_uris, &request.allowed_scopes)?;

        let client_id = Uuid::new_v4().to_string();
        let client_secret = generate_client_secret();
        let client_secret_hash = hash_client_secret(&client_secret)?;

        let client = self
            .client_repo
            .create(
                &client_id,
                &client_secret_hash,
                &request.client_name,
                &request.redirect_uris,
                &request.allowed_scopes,
                request.is_confidential,
            )
            .await?;

        tracing::info!(client_id = %client.client_id, name = %client.client_name, "registered OAuth client");

        Ok((client, client_secret))
    }

    pub async fn get(&self, client_id: &str) -> Result<Option<Client>, OAuthError> {
        self.client_repo.find_by_client_id(client_id).await
    }

    pub async fn list(&self) -> Result<Vec<Client>, OAuthError> {
        self.client_repo.list_all().await
    }

    /// Apply a partial update; absent fields keep their stored values.
    pub async fn update(
        &self,
        client_id: &str,
        patch: &ClientUpdateRequest,
    ) -> Result<Client, OAuthError> {
        let current = self
            .get(client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)?;

        let client_name = patch
            .client_name
            .clone()
            .unwrap_or(current.client_name);
        let redirect_uris = patch
            .redirect_uris
            .clone()
            .unwrap_or(current.redirect_uris);
        let allowed_scopes = patch
            .allowed_scopes
            .clone()
            .unwrap_or(current.allowed_scopes);

        self.validate_metadata(&redirect_uris, &allowed_scopes)?;

        self.client_repo
            .update(client_id, &client_name, &redirect_uris, &allowed_scopes)
            .await
    }

    pub async fn delete(&self, client_id: &str) -> Result<(), OAuthError> {
        self.client_repo.delete(client_id).await
    }

    /// Authenticate a confidential client by id and secret.
    ///
    /// The secret is verified against the stored bcrypt hash; bcrypt
    /// compares digests in constant time. The same `invalid_client` error
    /// covers an unknown id and a wrong secret.
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Client, OAuthError> {
        let client = self
            .get(client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)?;

        if !verify_client_secret(client_secret, &client.client_secret_hash)? {
            return Err(OAuthError::InvalidClient);
        }

        Ok(client)
    }

    /// Validate registration metadata: non-empty exact-match redirect URIs
    /// and a non-empty scope set drawn from the configured valid scopes,
    /// covering the configured required scopes.
    fn validate_metadata(
        &self,
        redirect_uris: &[String],
        allowed_scopes: &[String],
    ) -> Result<(), OAuthError> {
        if redirect_uris.is_empty() {
            return Err(OAuthError::InvalidRequest(
                "at least one redirect_uri is required".to_string(),
            ));
        }
        for uri in redirect_uris {
            if !is_absolute_http_uri(uri) {
                return Err(OAuthError::InvalidRequest(format!(
                    "redirect_uri must be an absolute http(s) URI: {}",
                    uri
                )));
            }
        }

        if allowed_scopes.is_empty() {
            return Err(OAuthError::InvalidScope(
                "at least one scope is required".to_string(),
            ));
        }
        for scope in allowed_scopes {
            if !is_valid_scope_token(scope) {
                return Err(OAuthError::InvalidScope(format!(
                    "malformed scope: {}",
                    scope
                )));
            }
        }
        if !scopes_allowed(allowed_scopes, &self.config.valid_scopes) {
            return Err(OAuthError::InvalidScope(
                "one or more scopes are not recognized by this server".to_string(),
            ));
        }
        if !self
            .config
            .required_scopes
            .iter()
            .all(|s| allowed_scopes.contains(s))
        {
            return Err(OAuthError::InvalidScope(
                "client must include the server's required scopes".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_absolute_http_uri(uri: &str) -> bool {
    let rest = uri
        .strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"));
    matches!(rest, Some(tail) if !tail.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_absolute_http_uri() {
        assert!(is_absolute_http_uri("https://app/cb"));
        assert!(is_absolute_http_uri("http://localhost:8000/callback"));
        assert!(!is_absolute_http_uri("https://"));
        assert!(!is_absolute_http_uri("ftp://app/cb"));
        assert!(!is_absolute_http_uri("/relative/path"));
        assert!(!is_absolute_http_uri("app/cb"));
    }
}
