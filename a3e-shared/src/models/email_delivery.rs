/// Tracked email deliveries
///
/// Nurture and trial-ending emails must go out at most once per user. The
/// scheduler claims a `dedupe_key` here in the same transaction that
/// enqueues the send job; a second claim for the same key is a no-op.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE email_deliveries (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID REFERENCES users(id) ON DELETE CASCADE,
///     template VARCHAR(50) NOT NULL,
///     dedupe_key VARCHAR(255) NOT NULL UNIQUE,
///     provider VARCHAR(30),
///     status VARCHAR(20) NOT NULL DEFAULT 'queued',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     sent_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailDelivery {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub template: String,
    pub dedupe_key: String,
    pub provider: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// `{user}:{template}`
pub fn dedupe_key(user_id: Uuid, template: &str) -> String {
    format!("{user_id}:{template}")
}

impl EmailDelivery {
    /// Reserves a dedupe key
    ///
    /// Returns `None` when the key was already claimed.
    pub async fn claim<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Option<Uuid>,
        template: &str,
        dedupe_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, EmailDelivery>(
            r#"
            INSERT INTO email_deliveries (user_id, template, dedupe_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (dedupe_key) DO NOTHING
            RETURNING id, user_id, template, dedupe_key, provider, status, created_at, sent_at
            "#,
        )
        .bind(user_id)
        .bind(template)
        .bind(dedupe_key)
        .fetch_optional(executor)
        .await
    }

    pub async fn mark_sent(pool: &PgPool, dedupe_key: &str, provider: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE email_deliveries
            SET status = 'sent', provider = $2, sent_at = NOW()
            WHERE dedupe_key = $1
            "#,
        )
        .bind(dedupe_key)
        .bind(provider)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_failed(pool: &PgPool, dedupe_key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE email_deliveries SET status = 'failed' WHERE dedupe_key = $1 AND status <> 'sent'",
        )
        .bind(dedupe_key)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_key(pool: &PgPool, dedupe_key: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, EmailDelivery>(
            r#"
            SELECT id, user_id, template, dedupe_key, provider, status, created_at, sent_at
            FROM email_deliveries
            WHERE dedupe_key = $1
            "#,
        )
        .bind(dedupe_key)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_key_format() {
        let id = Uuid::nil();
        assert_eq!(
            dedupe_key(id, "trial_nurture_day3"),
            "00000000-0000-0000-0000-000000000000:trial_nurture_day3"
        );
    }
}
