/// Background job records
///
/// The API enqueues work here and `a3e-worker` claims it. Payloads are typed
/// through [`JobPayload`]; the `kind` column mirrors the payload tag so the
/// CHECK constraint and indexes can see it.
///
/// # State machine
///
/// ```text
/// pending ──claim──> running ──ok──> succeeded
///    ^                  │
///    └──retry (backoff)─┤
///                       └──attempts exhausted──> failed
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TABLE jobs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     kind VARCHAR(40) NOT NULL,
///     payload JSONB NOT NULL DEFAULT '{}',
///     state VARCHAR(20) NOT NULL DEFAULT 'pending',
///     attempts INTEGER NOT NULL DEFAULT 0,
///     max_attempts INTEGER NOT NULL DEFAULT 5,
///     run_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_error TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use a3e_shared::models::job::{Job, JobPayload};
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
///
/// # async fn example(pool: PgPool, document_id: Uuid) -> Result<(), sqlx::Error> {
/// let job = Job::enqueue(&pool, &JobPayload::AnalyzeDocument { document_id }).await?;
/// assert_eq!(job.kind, "analyze_document");
/// # Ok(())
/// # }
/// ```

use crate::email::templates::EmailTemplate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgExecutor, PgPool};
use uuid::Uuid;

pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

pub const JOB_COLUMNS: &str =
    "id, kind, payload, state, attempts, max_attempts, run_at, last_error, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    AnalyzeDocument,
    SendEmail,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::AnalyzeDocument => "analyze_document",
            JobKind::SendEmail => "send_email",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "analyze_document" => Some(JobKind::AnalyzeDocument),
            "send_email" => Some(JobKind::SendEmail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Typed job body, stored as JSONB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Run standards mapping over a stored document
    AnalyzeDocument { document_id: Uuid },

    /// Render and deliver one email
    SendEmail {
        to: String,
        user_id: Option<Uuid>,
        template: EmailTemplate,

        /// Key into `email_deliveries` when the send is tracked
        dedupe_key: Option<String>,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::AnalyzeDocument { .. } => JobKind::AnalyzeDocument,
            JobPayload::SendEmail { .. } => JobKind::SendEmail,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub state: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Decodes the JSONB payload
    pub fn decode_payload(&self) -> Result<JobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Enqueues a job runnable immediately
    ///
    /// Takes a pool or an open transaction, so callers can enqueue together
    /// with the write that motivates the job.
    pub async fn enqueue<'e>(executor: impl PgExecutor<'e>, payload: &JobPayload) -> Result<Self, sqlx::Error> {
        Self::enqueue_at(executor, payload, Utc::now()).await
    }

    /// Enqueues a job that becomes claimable at `run_at`
    pub async fn enqueue_at<'e>(
        executor: impl PgExecutor<'e>,
        payload: &JobPayload,
        run_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (kind, payload, max_attempts, run_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {JOB_COLUMNS}"
        );

        let job = sqlx::query_as::<_, Job>(&query)
            .bind(payload.kind().as_str())
            .bind(Json(payload))
            .bind(DEFAULT_MAX_ATTEMPTS)
            .bind(run_at)
            .fetch_one(executor)
            .await?;

        tracing::debug!(job_id = %job.id, kind = %job.kind, "Job enqueued");
        Ok(job)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
