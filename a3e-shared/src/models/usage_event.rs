/// Usage events
///
/// An append-only log of billable or notable actions. Monthly quotas are
/// counted from this table; the lifetime counters on `users` are bumped in
/// the same transaction by [`UsageEvent::record_with_counter`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE usage_events (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     kind VARCHAR(30) NOT NULL,
///     quantity INTEGER NOT NULL DEFAULT 1,
///     metadata JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use a3e_shared::models::usage_event::{UsageEvent, UsageKind};
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// UsageEvent::record(&pool, user_id, UsageKind::Login, serde_json::json!({})).await?;
/// let logins = UsageEvent::count_this_month(&pool, user_id, UsageKind::Login).await?;
/// # Ok(())
/// # }
/// ```

use crate::models::user::{UsageCounter, User};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Login,
    DocumentUpload,
    Analysis,
    Report,
    Download,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Login => "login",
            UsageKind::DocumentUpload => "document_upload",
            UsageKind::Analysis => "analysis",
            UsageKind::Report => "report",
            UsageKind::Download => "download",
        }
    }

    /// Lifetime counter on `users` that tracks this kind, if any
    pub fn counter(&self) -> Option<UsageCounter> {
        match self {
            UsageKind::DocumentUpload => Some(UsageCounter::DocumentsUploaded),
            UsageKind::Analysis => Some(UsageCounter::AnalysesRun),
            UsageKind::Report => Some(UsageCounter::ReportsGenerated),
            UsageKind::Login | UsageKind::Download => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub quantity: i32,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Per-kind totals for the current month
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyUsage {
    pub logins: i64,
    pub document_uploads: i64,
    pub analyses: i64,
    pub reports: i64,
    pub downloads: i64,
}

/// First instant of the month containing `now` (UTC)
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

impl UsageEvent {
    /// Appends one event without touching counters
    pub async fn record(
        pool: &PgPool,
        user_id: Uuid,
        kind: UsageKind,
        metadata: serde_json::Value,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, UsageEvent>(
            r#"
            INSERT INTO usage_events (user_id, kind, metadata)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, kind, quantity, metadata, created_at
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(metadata)
        .fetch_one(pool)
        .await
    }

    /// Appends an event and bumps the matching lifetime counter atomically
    pub async fn record_with_counter(
        pool: &PgPool,
        user_id: Uuid,
        kind: UsageKind,
        metadata: serde_json::Value,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let event = sqlx::query_as::<_, UsageEvent>(
            r#"
            INSERT INTO usage_events (user_id, kind, metadata)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, kind, quantity, metadata, created_at
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(metadata)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(counter) = kind.counter() {
            User::increment_counter(&mut tx, user_id, counter, event.quantity).await?;
        }

        tx.commit().await?;
        Ok(event)
    }

    pub async fn count_since(
        pool: &PgPool,
        user_id: Uuid,
        kind: UsageKind,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM usage_events
            WHERE user_id = $1 AND kind = $2 AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    pub async fn count_this_month(
        pool: &PgPool,
        user_id: Uuid,
        kind: UsageKind,
    ) -> Result<i64, sqlx::Error> {
        Self::count_since(pool, user_id, kind, month_start(Utc::now())).await
    }

    pub async fn monthly_summary(pool: &PgPool, user_id: Uuid) -> Result<MonthlyUsage, sqlx::Error> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT kind, COALESCE(SUM(quantity), 0)::BIGINT
            FROM usage_events
            WHERE user_id = $1 AND created_at >= $2
            GROUP BY kind
            "#,
        )
        .bind(user_id)
        .bind(month_start(Utc::now()))
        .fetch_all(pool)
        .await?;

        let mut usage = MonthlyUsage::default();
        for (kind, total) in rows {
            match kind.as_str() {
                "login" => usage.logins = total,
                "document_upload" => usage.document_uploads = total,
                "analysis" => usage.analyses = total,
                "report" => usage.reports = total,
                "download" => usage.downloads = total,
                _ => {}
            }
        }

        Ok(usage)
    }

    pub async fn list_recent(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UsageEvent>(
            r#"
            SELECT id, user_id, kind, quantity, metadata, created_at
            FROM usage_events
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 15, 42, 9).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_counter_mapping() {
        assert_eq!(UsageKind::Analysis.counter(), Some(UsageCounter::AnalysesRun));
        assert_eq!(UsageKind::Login.counter(), None);
        assert_eq!(UsageKind::DocumentUpload.as_str(), "document_upload");
    }
}
