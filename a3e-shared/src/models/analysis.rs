/// Standards-mapping results per document
///
/// One row per document; re-running an analysis overwrites it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE document_analyses (
///     document_id UUID PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
///     standard_set VARCHAR(20) NOT NULL,
///     mappings JSONB NOT NULL DEFAULT '[]',
///     compliance_score INTEGER NOT NULL,
///     coverage DOUBLE PRECISION NOT NULL,
///     summary TEXT NOT NULL,
///     analyzed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use crate::standards::mapping::StandardMapping;
use crate::standards::scoring::ComplianceScore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentAnalysis {
    pub document_id: Uuid,
    pub standard_set: String,
    pub mappings: Json<Vec<StandardMapping>>,
    pub compliance_score: i32,
    pub coverage: f64,
    pub summary: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Analysis joined with the owning document's filename
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserAnalysis {
    pub document_id: Uuid,
    pub filename: String,
    pub standard_set: String,
    pub mappings: Json<Vec<StandardMapping>>,
    pub compliance_score: i32,
    pub coverage: f64,
    pub analyzed_at: DateTime<Utc>,
}

impl DocumentAnalysis {
    /// Inserts or replaces the analysis of a document
    pub async fn upsert(
        pool: &PgPool,
        document_id: Uuid,
        standard_set: &str,
        mappings: Vec<StandardMapping>,
        score: &ComplianceScore,
        summary: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, DocumentAnalysis>(
            r#"
            INSERT INTO document_analyses (document_id, standard_set, mappings, compliance_score, coverage, summary)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (document_id) DO UPDATE
            SET standard_set = EXCLUDED.standard_set,
                mappings = EXCLUDED.mappings,
                compliance_score = EXCLUDED.compliance_score,
                coverage = EXCLUDED.coverage,
                summary = EXCLUDED.summary,
                analyzed_at = NOW()
            RETURNING document_id, standard_set, mappings, compliance_score, coverage, summary, analyzed_at
            "#,
        )
        .bind(document_id)
        .bind(standard_set)
        .bind(Json(mappings))
        .bind(score.score as i32)
        .bind(score.coverage)
        .bind(summary)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_document(
        pool: &PgPool,
        document_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DocumentAnalysis>(
            r#"
            SELECT document_id, standard_set, mappings, compliance_score, coverage, summary, analyzed_at
            FROM document_analyses
            WHERE document_id = $1
            "#,
        )
        .bind(document_id)
        .fetch_optional(pool)
        .await
    }

    /// Every analysis belonging to a user, newest first
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<UserAnalysis>, sqlx::Error> {
        sqlx::query_as::<_, UserAnalysis>(
            r#"
            SELECT a.document_id, d.filename, a.standard_set, a.mappings,
                   a.compliance_score, a.coverage, a.analyzed_at
            FROM document_analyses a
            JOIN documents d ON d.id = a.document_id
            WHERE d.user_id = $1
            ORDER BY a.analyzed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
