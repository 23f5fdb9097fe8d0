use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres};
use tempo_core::models::User;
use tempo_core::AppError;
use uuid::Uuid;

/// Personal access token database model. Only the SHA-256 digest of the
/// bearer token is stored.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct AccessTokenRepository {
    pool: PgPool,
}

impl AccessTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a new token digest for a user.
    #[tracing::instrument(
        skip(self, token_hash),
        fields(db.table = "access_tokens", db.operation = "insert")
    )]
    pub async fn create_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<AccessToken, AppError> {
        let access_token = sqlx::query_as::<Postgres, AccessToken>(
            r#"
            INSERT INTO access_tokens (user_id, token_hash)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create access token");
            AppError::from(e)
        })?;

        tracing::info!(
            access_token_id = %access_token.id,
            user_id = %user_id,
            "Access token created"
        );

        Ok(access_token)
    }

    /// Resolve a presented bearer token (by digest) to its user. Revoked
    /// tokens resolve to nothing.
    #[tracing::instrument(
        skip(self, token_hash),
        fields(db.table = "access_tokens", db.operation = "select")
    )]
    pub async fn find_user_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(
            r#"
            SELECT u.id, u.email, u.display_name, u.is_superadmin, u.created_at, u.updated_at
            FROM access_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = $1 AND t.revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to resolve access token");
            AppError::from(e)
        })?;

        Ok(user)
    }

    /// Record token usage. Callers treat failures as non-fatal.
    pub async fn touch_last_used(&self, token_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE access_tokens SET last_used_at = NOW() WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record access token use");
            AppError::from(e)
        })?;

        Ok(())
    }
}
