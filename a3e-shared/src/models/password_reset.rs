/// Password reset tokens
///
/// At most one unused token exists per user (partial unique index). Issuing
/// a new token first retires the previous one in the same transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE password_resets (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     token_hash CHAR(64) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ NOT NULL,
///     used_at TIMESTAMPTZ
/// );
/// CREATE UNIQUE INDEX idx_password_resets_one_active
///     ON password_resets(user_id) WHERE used_at IS NULL;
/// ```

use crate::auth::tokens::{generate_token, hash_token, RESET_TOKEN_LENGTH};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Reset tokens expire after one hour
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PasswordReset {
    pub id: Uuid,
    pub user_id: Uuid,

    #[serde(skip_serializing, default)]
    pub token_hash: String,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl PasswordReset {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }

    /// Issues a fresh token for `user_id`
    ///
    /// Returns the row and the plaintext token. The plaintext is only ever
    /// handed to the email job.
    pub async fn issue(pool: &PgPool, user_id: Uuid) -> Result<(Self, String), sqlx::Error> {
        let token = generate_token(RESET_TOKEN_LENGTH);
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);

        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE password_resets SET used_at = NOW() WHERE user_id = $1 AND used_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            INSERT INTO password_resets (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, created_at, expires_at, used_at
            "#,
        )
        .bind(user_id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((reset, token))
    }

    /// Marks a presented token used if it is valid
    ///
    /// Returns the owning user id, or `None` when the token is unknown,
    /// expired or already spent.
    pub async fn consume(pool: &PgPool, token: &str) -> Result<Option<Uuid>, sqlx::Error> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE password_resets
            SET used_at = NOW()
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
            RETURNING user_id
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(pool)
        .await?;

        Ok(user_id)
    }
}
