//! # A³E API Server
//!
//! Serves the `/api` surface and `/health`. Background work (analysis,
//! email) is queued in PostgreSQL and picked up by `a3e-worker`.
//!
//! ## Startup
//!
//! 1. Load configuration (`.env` is honored)
//! 2. Connect to PostgreSQL and apply migrations
//! 3. Build the storage backend and payment provider
//! 4. Connect to Redis for rate limiting, if configured
//! 5. Serve until ctrl-c / SIGTERM
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p a3e-api
//! ```

use a3e_api::{
    app::{build_router, AppState},
    config::Config,
};
use a3e_shared::{
    billing::{mock::MockPaymentProvider, stripe::StripeClient, PaymentProvider},
    db::{
        migrations::run_migrations,
        pool::{create_pool, DatabaseConfig},
    },
    redis::{FixedWindowLimiter, RedisClient, RedisConfig},
};
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "a3e_api=info,a3e_shared=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
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

    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.json_logs);

    tracing::info!("A³E API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..DatabaseConfig::default()
    })
    .await?;
    run_migrations(&pool).await?;

    let storage = config.storage.build()?;
    tracing::info!(backend = storage.name(), "Document storage ready");

    let payments: Arc<dyn PaymentProvider> = match &config.stripe.secret_key {
        Some(key) => Arc::new(StripeClient::new(key.clone())?),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set; using the mock payment provider");
            Arc::new(MockPaymentProvider::new())
        }
    };
    if config.stripe.webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set; webhook deliveries will be rejected");
    }

    let limiter = match &config.redis.url {
        Some(url) => match RedisClient::connect(RedisConfig::new(url.clone())).await {
            Ok(client) => Some(FixedWindowLimiter::new(
                client,
                config.redis.rate_limit_requests,
                config.redis.rate_limit_window_seconds,
            )),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable; rate limiting disabled");
                None
            }
        },
        None => {
            tracing::info!("REDIS_URL not set; rate limiting disabled");
            None
        }
    };

    let bind_address = config.bind_address();
    let mut state = AppState::new(pool.clone(), config, storage, payments);
    if let Some(limiter) = limiter {
        state = state.with_limiter(limiter);
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}
