//! Token revocation, the blacklist, and introspection.
//!
//! Revoking inserts a blacklist row whose expiry is copied from the token
//! itself, and flags the token row, all in one transaction; a committed
//! revocation is therefore visible to every bearer validation that starts
//! afterwards. Blacklist rows past their expiry are deleted lazily when
//! consulted.

use sqlx::MySqlPool;

use crate::dto::oauth::IntrospectResponse;
use crate::error::OAuthError;
use crate::repositories::{BlacklistRepository, TokenRepository};
use crate::utils::secret::hash_token;

#[derive(Clone)]
pub struct RevocationService {
    token_repo: TokenRepository,
    pool: MySqlPool,
}

impl RevocationService {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            token_repo: TokenRepository::new(pool.clone()),
            pool,
        }
    }

    /// Revoke a token by its access or refresh string.
    ///
    /// Unknown tokens are a no-op: the endpoint is idempotent and reveals
    /// nothing about which strings exist.
    pub async fn revoke(&self, token: &str, reason: Option<&str>) -> Result<(), OAuthError> {
        let token_hash = hash_token(token);

        let Some(stored) = self.token_repo.find_by_either_hash(&token_hash).await? else {
            return Ok(());
        };

        // Blacklist the presented string with the expiry of the matching
        // half of the pair, and flag the row so the other half dies too.
        let expires_at = if stored.access_token_hash == token_hash {
            stored.access_token_expires_at
        } else {
            stored.refresh_token_expires_at
        };

        let mut tx = self.pool.begin().await?;
        BlacklistRepository::insert(&mut tx, &token_hash, expires_at, reason).await?;
        TokenRepository::mark_revoked(&mut tx, stored.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %stored.user_id, client_id = %stored.client_id, "revoked token");

        Ok(())
    }

    /// Check whether a token hash is blacklisted, deleting the entry in the
    /// same transaction when it has outlived the token it blacklists.
    pub async fn is_blacklisted(&self, token_hash: &str) -> Result<bool, OAuthError> {
        let mut tx = self.pool.begin().await?;
        let entry = BlacklistRepository::find_by_token_hash(&mut tx, token_hash).await?;

        match entry {
            None => {
                tx.commit().await?;
                Ok(false)
            }
            Some(entry) if entry.is_expired() => {
                BlacklistRepository::delete(&mut tx, entry.id).await?;
                tx.commit().await?;
                Ok(false)
            }
            Some(_) => {
                tx.commit().await?;
                Ok(true)
            }
        }
    }

    /// Introspect an access token. Any validation or blacklist failure
    /// yields `{active: false}` with no further detail.
    pub async fn introspect(&self, token: &str) -> Result<IntrospectResponse, OAuthError> {
        let token_hash = hash_token(token);

        let Some(stored) = self.token_repo.find_by_access_token_hash(&token_hash).await? else {
            return Ok(IntrospectResponse::inactive());
        };

        if stored.is_revoked || stored.is_access_token_expired() {
            return Ok(IntrospectResponse::inactive());
        }

        if self.is_blacklisted(&token_hash).await? {
            return Ok(IntrospectResponse::inactive());
        }

        Ok(IntrospectResponse::active(
            stored.scope.clone(),
            stored.client_id.to_string(),
            stored.user_id.to_string(),
            stored.access_token_expires_at.timestamp(),
        ))
    }
}
