//! # A³E Worker
//!
//! Runs queued jobs: document analysis and email delivery. Also scans
//! trialing users for nurture and trial-ending emails.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p a3e-worker
//! ```
//!
//! Several workers may run against the same database.

use a3e_shared::{
    db::pool::{create_pool, DatabaseConfig},
    email::fallback::FallbackMailer,
};
use a3e_worker::{
    config::WorkerConfig,
    handlers::{AnalyzeDocumentHandler, HandlerRegistry, SendEmailHandler},
    orchestrator::{OrchestratorConfig, WorkerOrchestrator},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "a3e_worker=info,a3e_shared=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing running jobs...");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env()?;
    init_tracing(config.json_logs);

    tracing::info!("A³E Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    // Migrations are applied by the API
    let pool = create_pool(DatabaseConfig {
        url: config.database_url.clone(),
        max_connections: config.max_connections,
        ..DatabaseConfig::default()
    })
    .await?;

    let storage = config.storage.build()?;
    let mailer = FallbackMailer::from_settings(&config.email)?;
    tracing::info!(
        storage = storage.name(),
        email_providers = ?mailer.provider_names(),
        "Worker dependencies ready"
    );

    let handlers = HandlerRegistry::new()
        .with(Arc::new(AnalyzeDocumentHandler::new(pool.clone(), storage)))
        .with(Arc::new(SendEmailHandler::new(
            pool.clone(),
            mailer,
            config.email_from.clone(),
            config.app_url.clone(),
        )));

    let orchestrator = WorkerOrchestrator::new(
        pool.clone(),
        handlers,
        OrchestratorConfig {
            concurrency: config.concurrency,
            poll_interval: config.poll_interval,
            nurture_interval: config.nurture_interval,
            stale_after: config.stale_after,
        },
    );

    tokio::spawn(cancel_on_signal(orchestrator.shutdown_token()));
    orchestrator.run().await?;

    pool.close().await;
    tracing::info!("Worker stopped");

    Ok(())
}
