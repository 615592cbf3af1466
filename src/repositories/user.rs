use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::OAuthError;
use crate::models::User;

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: MySqlPool,
}

impl UserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create a new user. `hashed_password` must already be an argon2 PHC
    /// string.
    pub async fn create(
        &self,
        email: &str,
        username: &str,
        hashed_password: &str,
        is_superuser: bool,
    ) -> Result<User, OAuthError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, hashed_password, is_active, is_superuser)
            VALUES (?, ?, ?, ?, true, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(email)
        .bind(username)
        .bind(hashed_password)
        .bind(is_superuser)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| OAuthError::ServerError("failed to fetch created user".to_string()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, OAuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, hashed_password, is_active, is_superuser,
                   created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, OAuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, hashed_password, is_active, is_superuser,
                   created_at, updated_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find an active user by id; inactive users resolve to `None`.
    pub async fn find_active_by_id(&self, id: Uuid) -> Result<Option<User>, OAuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, hashed_password, is_active, is_superuser,
                   created_at, updated_at
            FROM users
            WHERE id = ? AND is_active = true
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
