/// Worker orchestrator
///
/// The main loop: claim a job, run it on its handler in a Tokio task, record
/// the result. Concurrency is bounded by a semaphore; the loop only claims
/// when a permit is free, so a busy worker leaves jobs for its peers.
///
/// # Architecture
///
/// ```text
/// WorkerOrchestrator
///   ├─> JobQueue: claim (SKIP LOCKED), complete, fail/retry
///   ├─> HandlerRegistry: handler for the job kind
///   ├─> JobHandler: do the work
///   └─> NurtureScheduler: scan trialing users every nurture interval
/// ```
///
/// # Shutdown
///
/// Cancelling the token stops claiming. Jobs already running are awaited
/// so none is left `running`.
///
/// # Example
///
/// ```no_run
/// use a3e_worker::handlers::HandlerRegistry;
/// use a3e_worker::orchestrator::{OrchestratorConfig, WorkerOrchestrator};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, registry: HandlerRegistry) -> anyhow::Result<()> {
/// let orchestrator = WorkerOrchestrator::new(pool, registry, OrchestratorConfig::default());
/// let shutdown = orchestrator.shutdown_token();
///
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     shutdown.cancel();
/// });
///
/// orchestrator.run().await?;
/// # Ok(())
/// # }
/// ```

use crate::handlers::HandlerRegistry;
use crate::nurture::NurtureScheduler;
use crate::queue::{FailureOutcome, JobQueue};
use a3e_shared::models::job::{Job, JobKind};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Jobs run at once
    pub concurrency: usize,

    /// Delay before polling again when the queue is empty
    pub poll_interval: Duration,

    /// `None` disables the nurture scheduler
    pub nurture_interval: Option<Duration>,

    /// `running` jobs older than this are requeued at startup
    pub stale_after: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            concurrency: 4,
            poll_interval: Duration::from_secs(1),
            nurture_interval: Some(Duration::from_secs(60 * 60)),
            stale_after: Duration::from_secs(15 * 60),
        }
    }
}

/// How one job ended, for logs and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Retrying,
    Failed(String),
}

pub struct WorkerOrchestrator {
    queue: JobQueue,
    handlers: Arc<HandlerRegistry>,
    nurture: NurtureScheduler,
    config: OrchestratorConfig,
    shutdown_token: CancellationToken,
}

impl WorkerOrchestrator {
    pub fn new(db: PgPool, handlers: HandlerRegistry, config: OrchestratorConfig) -> Self {
        WorkerOrchestrator {
            queue: JobQueue::new(db.clone()),
            handlers: Arc::new(handlers),
            nurture: NurtureScheduler::new(db),
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Cancel to stop the loop after in-flight jobs finish
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let concurrency = self.config.concurrency.max(1);
        tracing::info!(
            concurrency,
            handlers = self.handlers.len(),
            nurture = self.config.nurture_interval.is_some(),
            "Worker orchestrator starting"
        );

        match self.queue.requeue_stale(self.config.stale_after).await {
            Ok(0) => {}
            Ok(count) => tracing::warn!(count, "Requeued jobs abandoned by a previous worker"),
            Err(e) => tracing::error!(error = %e, "Failed to requeue stale jobs"),
        }

        let permits = Arc::new(Semaphore::new(concurrency));

        // Ticks immediately, then every interval; a very long interval stands in for "off"
        let mut nurture_tick = tokio::time::interval(
            self.config
                .nurture_interval
                .unwrap_or(Duration::from_secs(365 * 24 * 60 * 60)),
        );
        nurture_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let permit = tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = nurture_tick.tick(), if self.config.nurture_interval.is_some() => {
                    self.run_nurture().await;
                    continue;
                }
                permit = permits.clone().acquire_owned() => permit?,
            };

            let job = match self.queue.claim().await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    drop(permit);
                    self.idle(self.config.poll_interval).await;
                    continue;
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(error = %e, "Failed to claim job");
                    self.idle(self.config.poll_interval).await;
                    continue;
                }
            };

            let queue = self.queue.clone();
            let handlers = self.handlers.clone();
            tokio::spawn(async move {
                execute_job(&queue, &handlers, job).await;
                drop(permit);
            });
        }

        tracing::info!("Shutdown requested, waiting for running jobs");
        let _all = permits.acquire_many(concurrency as u32).await?;
        tracing::info!("Worker orchestrator shut down");

        Ok(())
    }

    async fn idle(&self, delay: Duration) {
        tokio::select! {
            _ = self.shutdown_token.cancelled() => {}
            _ = sleep(delay) => {}
        }
    }

    async fn run_nurture(&self) {
        if let Err(e) = self.nurture.run_once(Utc::now()).await {
            tracing::error!(error = %e, "Nurture scan failed");
        }
    }
}

/// Runs one claimed job to its next state
pub async fn execute_job(queue: &JobQueue, handlers: &HandlerRegistry, job: Job) -> JobOutcome {
    let job_id = job.id;

    let payload = match job.decode_payload() {
        Ok(payload) => payload,
        Err(e) => return give_up(queue, &job, &format!("Undecodable payload: {e}")).await,
    };

    let handler = match JobKind::from_str(&job.kind).and_then(|kind| handlers.get(kind)) {
        Some(handler) => handler,
        None => return give_up(queue, &job, &format!("No handler for job kind '{}'", job.kind)).await,
    };

    tracing::info!(%job_id, kind = %job.kind, attempt = job.attempts, "Running job");

    let error = match handler.handle(&payload).await {
        Ok(()) => {
            if let Err(e) = queue.complete(job_id).await {
                tracing::error!(%job_id, error = %e, "Failed to mark job succeeded");
            }
            tracing::info!(%job_id, kind = %job.kind, "Job succeeded");
            return JobOutcome::Succeeded;
        }
        Err(error) => error,
    };

    let message = error.to_string();

    if error.is_retryable() {
        match queue.fail(&job, &message).await {
            Ok(FailureOutcome::Retrying { run_at }) => {
                tracing::warn!(%job_id, kind = %job.kind, error = %message, %run_at, "Job failed, will retry");
                return JobOutcome::Retrying;
            }
            Ok(FailureOutcome::Exhausted) => {}
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to record job failure");
                return JobOutcome::Failed(message);
            }
        }
    } else if let Err(e) = queue.fail_permanently(job_id, &message).await {
        tracing::error!(%job_id, error = %e, "Failed to record job failure");
    }

    tracing::error!(%job_id, kind = %job.kind, error = %message, "Job failed");
    handler.on_exhausted(&payload, &error).await;
    JobOutcome::Failed(message)
}

async fn give_up(queue: &JobQueue, job: &Job, reason: &str) -> JobOutcome {
    tracing::error!(job_id = %job.id, kind = %job.kind, reason, "Job cannot run");
    if let Err(e) = queue.fail_permanently(job.id, reason).await {
        tracing::error!(job_id = %job.id, error = %e, "Failed to record job failure");
    }
    JobOutcome::Failed(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_config_default() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.nurture_interval, Some(Duration::from_secs(3600)));
        assert_eq!(config.stale_after, Duration::from_secs(900));
    }
}
