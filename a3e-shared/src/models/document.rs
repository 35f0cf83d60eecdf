/// Uploaded institutional documents
///
/// The row is metadata only; bytes live in the configured
/// [`StorageBackend`](crate::storage::StorageBackend) under `storage_key`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE documents (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     filename VARCHAR(255) NOT NULL,
///     content_type VARCHAR(255) NOT NULL,
///     size_bytes BIGINT NOT NULL,
///     storage_key VARCHAR(1024) NOT NULL UNIQUE,
///     storage_backend VARCHAR(20) NOT NULL,
///     sha256 CHAR(64) NOT NULL,
///     status VARCHAR(20) NOT NULL DEFAULT 'uploaded',
///     standard_set VARCHAR(20) NOT NULL DEFAULT 'sacscoc',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use crate::standards::catalog::StandardSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "id, user_id, filename, content_type, size_bytes, storage_key, \
     storage_backend, sha256, status, standard_set, created_at, updated_at";

/// Processing state of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Analyzed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Analyzed => "analyzed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(DocumentStatus::Uploaded),
            "processing" => Some(DocumentStatus::Processing),
            "analyzed" => Some(DocumentStatus::Analyzed),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Original client filename (sanitized)
    pub filename: String,

    pub content_type: String,
    pub size_bytes: i64,

    #[serde(skip_serializing, default)]
    pub storage_key: String,

    /// `local` or `s3`
    pub storage_backend: String,

    /// Hex SHA-256 of the content
    pub sha256: String,

    pub status: String,
    pub standard_set: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateDocument {
    /// Pre-allocated so the storage key can contain it
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub storage_backend: String,
    pub sha256: String,
    pub standard_set: StandardSet,
}

impl Document {
    pub fn get_status(&self) -> Option<DocumentStatus> {
        DocumentStatus::from_str(&self.status)
    }

    pub fn get_standard_set(&self) -> StandardSet {
        StandardSet::from_str(&self.standard_set).unwrap_or_default()
    }

    pub async fn create(pool: &PgPool, data: CreateDocument) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents (id, user_id, filename, content_type, size_bytes, storage_key,
                                    storage_backend, sha256, standard_set)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {DOCUMENT_COLUMNS}"
        );

        sqlx::query_as::<_, Document>(&query)
            .bind(data.id)
            .bind(data.user_id)
            .bind(data.filename)
            .bind(data.content_type)
            .bind(data.size_bytes)
            .bind(data.storage_key)
            .bind(data.storage_backend)
            .bind(data.sha256)
            .bind(data.standard_set.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Ownership-scoped lookup; another user's document reads as missing
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Document>(&query)
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
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        );

        sqlx::query_as::<_, Document>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_by_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        status: DocumentStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE documents SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Moves a document to `processing` unless it is already there
    ///
    /// Returns false when an analysis is already queued or running.
    pub async fn mark_processing(pool: &PgPool, id: Uuid, set: StandardSet) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = 'processing', standard_set = $2, updated_at = NOW()
            WHERE id = $1 AND status <> 'processing'
            "#,
        )
        .bind(id)
        .bind(set.as_str())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
