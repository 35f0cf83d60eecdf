/// Job queue reader
///
/// Claims runnable rows from `jobs` and records how they ended.
///
/// # Claiming
///
/// One job per claim, oldest `run_at` first, only jobs whose `run_at` has
/// passed. `FOR UPDATE SKIP LOCKED` lets several workers poll the same
/// table without handing out a job twice. Claiming increments `attempts`.
///
/// # Retries
///
/// A failed attempt goes back to `pending` with `run_at` pushed out by
/// [`backoff`] until `attempts` reaches `max_attempts`; then the job is
/// `failed` for good.
///
/// # Example
///
/// ```no_run
/// use a3e_worker::queue::JobQueue;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = JobQueue::new(pool);
///
/// if let Some(job) = queue.claim().await? {
///     println!("Claimed {} ({})", job.id, job.kind);
///     queue.complete(job.id).await?;
/// }
/// # Ok(())
/// # }
/// ```

use a3e_shared::models::job::{Job, JobState, JOB_COLUMNS};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// First retry delay
pub const BASE_BACKOFF: Duration = Duration::from_secs(30);

/// Retry delays never exceed this
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Longest `last_error` kept on a row
const MAX_ERROR_LEN: usize = 2000;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Job missing, or not in `running`
    #[error("Job not running: {0}")]
    NotRunning(Uuid),
}

/// What happened to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back in the queue
    Retrying { run_at: DateTime<Utc> },

    /// No attempts left
    Exhausted,
}

/// 30 s × 2^attempts, capped at one hour
pub fn backoff(attempts: i32) -> Duration {
    let exponent = attempts.clamp(0, 16) as u32;
    BASE_BACKOFF
        .checked_mul(2u32.pow(exponent))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_ERROR_LEN {
        return error.to_string();
    }
    let mut end = MAX_ERROR_LEN;
    while !error.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &error[..end])
}

#[derive(Clone)]
pub struct JobQueue {
    db: PgPool,
}

impl JobQueue {
    pub fn new(db: PgPool) -> Self {
        JobQueue { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    /// Claims the next runnable job, if any
    ///
    /// The claimed job is `running` with `attempts` already incremented.
    pub async fn claim(&self) -> Result<Option<Job>, QueueError> {
        let query = format!(
            r#"
            UPDATE jobs
            SET state = $1, attempts = attempts + 1, updated_at = NOW()
            WHERE id = (
                SELECT id
                FROM jobs
                WHERE state = $2 AND run_at <= NOW()
                ORDER BY run_at ASC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "#
        );

        let job = sqlx::query_as::<_, Job>(&query)
            .bind(JobState::Running.as_str())
            .bind(JobState::Pending.as_str())
            .fetch_optional(&self.db)
            .await?;

        if let Some(job) = &job {
            tracing::debug!(job_id = %job.id, kind = %job.kind, attempt = job.attempts, "Claimed job");
        }

        Ok(job)
    }

    pub async fn complete(&self, job_id: Uuid) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = $2, last_error = NULL, updated_at = NOW()
            WHERE id = $1 AND state = $3
            "#,
        )
        .bind(job_id)
        .bind(JobState::Succeeded.as_str())
        .bind(JobState::Running.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotRunning(job_id));
        }
        Ok(())
    }

    /// Records a failed attempt and schedules the retry, if any are left
    pub async fn fail(&self, job: &Job, error: &str) -> Result<FailureOutcome, QueueError> {
        if job.attempts >= job.max_attempts {
            self.fail_permanently(job.id, error).await?;
            return Ok(FailureOutcome::Exhausted);
        }

        let delay = chrono::Duration::from_std(backoff(job.attempts)).unwrap_or(chrono::Duration::hours(1));
        let run_at = Utc::now() + delay;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = $2, run_at = $3, last_error = $4, updated_at = NOW()
            WHERE id = $1 AND state = $5
            "#,
        )
        .bind(job.id)
        .bind(JobState::Pending.as_str())
        .bind(run_at)
        .bind(truncate_error(error))
        .bind(JobState::Running.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotRunning(job.id));
        }
        Ok(FailureOutcome::Retrying { run_at })
    }

    /// Fails a job without retrying
    pub async fn fail_permanently(&self, job_id: Uuid, error: &str) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = $2, last_error = $3, updated_at = NOW()
            WHERE id = $1 AND state = $4
            "#,
        )
        .bind(job_id)
        .bind(JobState::Failed.as_str())
        .bind(truncate_error(error))
        .bind(JobState::Running.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotRunning(job_id));
        }

        tracing::warn!(job_id = %job_id, "Job failed permanently");
        Ok(())
    }

    /// Requeues `running` jobs untouched for longer than `older_than`
    ///
    /// Jobs are left `running` when a worker dies mid-attempt. The attempt
    /// still counts.
    pub async fn requeue_stale(&self, older_than: Duration) -> Result<u64, QueueError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::minutes(15));

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = $1, last_error = 'Worker stopped during attempt', updated_at = NOW()
            WHERE state = $2 AND updated_at < $3
            "#,
        )
        .bind(JobState::Pending.as_str())
        .bind(JobState::Running.as_str())
        .bind(cutoff)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_thirty_seconds() {
        assert_eq!(backoff(0), Duration::from_secs(30));
        assert_eq!(backoff(1), Duration::from_secs(60));
        assert_eq!(backoff(3), Duration::from_secs(240));
        assert_eq!(backoff(6), Duration::from_secs(1920));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff(7), MAX_BACKOFF);
        assert_eq!(backoff(30), MAX_BACKOFF);
        assert_eq!(backoff(i32::MAX), MAX_BACKOFF);
        assert_eq!(backoff(-1), BASE_BACKOFF);
    }

    #[test]
    fn test_truncate_error() {
        assert_eq!(truncate_error("boom"), "boom");

        let long = "é".repeat(MAX_ERROR_LEN);
        let cut = truncate_error(&long);
        assert!(cut.ends_with('…'));
        assert!(cut.len() <= MAX_ERROR_LEN + '…'.len_utf8());
    }
}
