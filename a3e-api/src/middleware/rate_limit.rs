/// Rate limiting for credential endpoints
///
/// Login, registration and the password-reset endpoints are limited per
/// route and client IP with the fixed-window counter in
/// `a3e_shared::redis::rate_limit`. Limits come from `RATE_LIMIT_REQUESTS`
/// per `RATE_LIMIT_WINDOW_SECONDS` (10 per 60 s by default).
///
/// # Storage
///
/// The IP is the socket peer. With `TRUST_PROXY` set it is the last
/// `X-Forwarded-For` hop instead, the one our own proxy appended; earlier
/// hops are whatever the client sent.
///
/// Counters live in Redis under `rl:{path}:{ip}:{window}` and expire with
/// their window. Without `REDIS_URL` the layer is a pass-through; if Redis
/// errors at request time the request is let through and a warning logged.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: Requests allowed per window
/// - `X-RateLimit-Remaining`: Requests left in the current window
/// - `Retry-After`: Seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use a3e_shared::redis::RateLimitDecision;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

/// Client address for rate limiting and session records
pub fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
}

/// Counts the request against `{path}:{ip}` and rejects it with 429 once
/// the window is spent
pub async fn auth_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(limiter) = state.limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let ip = client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        state.config.api.trust_proxy,
    );
    let bucket = format!("{}:{}", request.uri().path(), ip);

    let decision = match limiter.hit(&bucket).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, %bucket, "Rate limiter unavailable, allowing request");
            return Ok(next.run(request).await);
        }
    };

    if !decision.allowed {
        tracing::info!(%bucket, limit = decision.limit, "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: decision.retry_after_secs,
            message: format!(
                "Too many attempts; try again in {} seconds",
                decision.retry_after_secs
            ),
        });
    }

    let mut response = next.run(request).await;
    apply_headers(&mut response, &decision);
    Ok(response)
}
