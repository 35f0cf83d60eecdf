/// Health check endpoint
///
/// Reports whether the server can reach its dependencies:
/// - PostgreSQL (required; `degraded` when unreachable)
/// - Redis (optional; `disabled` when not configured)
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "redis": "disabled",
///   "storage": "local",
///   "payments": "mock"
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use a3e_shared::db::pool::health_check as database_health;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    /// `connected`, `disconnected` or `disabled`
    pub redis: String,

    /// Storage backend name
    pub storage: String,

    /// Payment provider name
    pub payments: String,
}

/// Overall status; Redis is optional and never degrades the service
pub fn overall_status(database_ok: bool) -> &'static str {
    if database_ok {
        "healthy"
    } else {
        "degraded"
    }
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_ok = database_health(&state.db).await.is_ok();

    let redis = match &state.limiter {
        None => "disabled",
        Some(limiter) => match limiter.client().ping().await {
            Ok(true) => "connected",
            Ok(false) | Err(_) => "disconnected",
        },
    };

    Ok(Json(HealthResponse {
        status: overall_status(database_ok).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "connected" } else { "disconnected" }.to_string(),
        redis: redis.to_string(),
        storage: state.storage.name().to_string(),
        payments: state.payments.name().to_string(),
    }))
}
