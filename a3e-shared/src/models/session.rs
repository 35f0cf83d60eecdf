/// Refresh-token sessions
///
/// Each login or registration opens a session. The session id travels inside
/// both JWTs (`sid` claim) so access tokens die with their session, and the
/// refresh token is stored only as a SHA-256 hash.
///
/// Refresh rotates the hash. Presenting a refresh token whose hash no longer
/// matches means an old token was replayed, and the whole session is revoked.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE user_sessions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     refresh_token_hash CHAR(64) NOT NULL,
///     user_agent VARCHAR(512),
///     ip_address VARCHAR(64),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_used_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ NOT NULL,
///     revoked_at TIMESTAMPTZ
/// );
/// ```

use crate::auth::tokens::hash_token;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Session row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,

    #[serde(skip_serializing, default)]
    pub refresh_token_hash: String,

    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Input for opening a session
///
/// The id is chosen by the caller because it must be embedded in the refresh
/// token before that token's hash can be stored.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of presenting a refresh token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Hash matched and was replaced
    Rotated,

    /// Session missing, revoked or expired
    Inactive,

    /// Hash mismatch; the session has been revoked
    ReuseDetected,
}

impl UserSession {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }

    pub async fn create(pool: &PgPool, data: CreateSession) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (id, user_id, refresh_token_hash, user_agent, ip_address, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, refresh_token_hash, user_agent, ip_address,
                      created_at, last_used_at, expires_at, revoked_at
            "#,
        )
        .bind(data.id)
        .bind(data.user_id)
        .bind(hash_token(&data.refresh_token))
        .bind(data.user_agent)
        .bind(data.ip_address)
        .bind(data.expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserSession>(
            r#"
            SELECT id, user_id, refresh_token_hash, user_agent, ip_address,
                   created_at, last_used_at, expires_at, revoked_at
            FROM user_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Cheap check used by the access-token middleware
    pub async fn is_session_active(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let active: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_sessions
                WHERE id = $1 AND user_id = $2
                  AND revoked_at IS NULL AND expires_at > NOW()
            )
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(active)
    }

    /// Swaps the stored refresh hash from `presented` to `replacement`
    ///
    /// The compare-and-swap runs in one UPDATE so two concurrent refreshes
    /// with the same token cannot both succeed.
    pub async fn rotate(
        pool: &PgPool,
        id: Uuid,
        presented: &str,
        replacement: &str,
    ) -> Result<RotationOutcome, sqlx::Error> {
        let presented_hash = hash_token(presented);

        let rotated = sqlx::query(
            r#"
            UPDATE user_sessions
            SET refresh_token_hash = $3, last_used_at = NOW()
            WHERE id = $1 AND refresh_token_hash = $2
              AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(id)
        .bind(&presented_hash)
        .bind(hash_token(replacement))
        .execute(pool)
        .await?;

        if rotated.rows_affected() == 1 {
            return Ok(RotationOutcome::Rotated);
        }

        let Some(session) = Self::find_by_id(pool, id).await? else {
            return Ok(RotationOutcome::Inactive);
        };

        if !session.is_active(Utc::now()) {
            return Ok(RotationOutcome::Inactive);
        }

        Self::revoke(pool, id).await?;
        Ok(RotationOutcome::ReuseDetected)
    }

    pub async fn revoke(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes every session of a user, optionally sparing one
    pub async fn revoke_all_for_user(
        pool: &PgPool,
        user_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET revoked_at = NOW()
            WHERE user_id = $1 AND revoked_at IS NULL
              AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
        .bind(user_id)
        .bind(except)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserSession>(
            r#"
            SELECT id, user_id, refresh_token_hash, user_agent, ip_address,
                   created_at, last_used_at, expires_at, revoked_at
            FROM user_sessions
            WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
            ORDER BY last_used_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(now: DateTime<Utc>) -> UserSession {
        UserSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            refresh_token_hash: "0".repeat(64),
            user_agent: None,
            ip_address: None,
            created_at: now,
            last_used_at: now,
            expires_at: now + Duration::days(30),
            revoked_at: None,
        }
    }

    #[test]
    fn test_session_activity() {
        let now = Utc::now();
        let mut s = session(now);
        assert!(s.is_active(now));

        s.revoked_at = Some(now);
        assert!(!s.is_active(now));

        let mut expired = session(now);
        expired.expires_at = now - Duration::seconds(1);
        assert!(!expired.is_active(now));
    }

    #[test]
    fn test_refresh_hash_is_not_serialized() {
        let json = serde_json::to_value(session(Utc::now())).unwrap();
        assert!(json.get("refresh_token_hash").is_none());
    }
}
