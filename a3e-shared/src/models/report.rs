/// Generated reports
///
/// The payload is a frozen snapshot built by [`crate::reports`] at creation
/// time; later analyses do not change an existing report.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE reports (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     kind VARCHAR(30) NOT NULL,
///     payload JSONB NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    ComplianceSummary,
    GapAnalysis,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::ComplianceSummary => "compliance_summary",
            ReportKind::GapAnalysis => "gap_analysis",
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            ReportKind::ComplianceSummary => "Compliance Summary",
            ReportKind::GapAnalysis => "Gap Analysis",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Listing row without the payload
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReportSummary {
    pub id: Uuid,
    pub title: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        kind: ReportKind,
        title: &str,
        payload: serde_json::Value,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Report>(
            r#"
            INSERT INTO reports (user_id, title, kind, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, title, kind, payload, created_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(kind.as_str())
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(
            r#"
            SELECT id, user_id, title, kind, payload, created_at
            FROM reports
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReportSummary>, sqlx::Error> {
        sqlx::query_as::<_, ReportSummary>(
            r#"
            SELECT id, title, kind, created_at
            FROM reports
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
