/// Fixed-window rate limiting on Redis
///
/// Each `(bucket, window)` pair is one counter key, `rl:{bucket}:{window}`,
/// bumped with INCR and given a TTL of one window in the same MULTI block.
/// Counters vanish on their own once the window passes.

use super::client::{RedisClient, RedisClientError};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,

    /// Seconds until the current window closes
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    /// Decision for the `count`-th request inside a window
    pub fn from_count(count: u64, limit: u32, now_secs: u64, window_secs: u64) -> Self {
        let window_secs = window_secs.max(1);
        RateLimitDecision {
            allowed: count <= u64::from(limit),
            limit,
            remaining: u64::from(limit).saturating_sub(count) as u32,
            retry_after_secs: window_secs - (now_secs % window_secs),
        }
    }
}

/// Key for a bucket in the window containing `now_secs`
pub fn window_key(bucket: &str, now_secs: u64, window_secs: u64) -> String {
    format!("rl:{}:{}", bucket, now_secs / window_secs.max(1))
}

#[derive(Debug, Clone)]
pub struct FixedWindowLimiter {
    client: RedisClient,
    limit: u32,
    window_secs: u64,
}

impl FixedWindowLimiter {
    pub fn new(client: RedisClient, limit: u32, window_secs: u64) -> Self {
        Self {
            client,
            limit,
            window_secs: window_secs.max(1),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    /// Counts one request against `bucket`
    pub async fn hit(&self, bucket: &str) -> Result<RateLimitDecision, RedisClientError> {
        let now_secs = Utc::now().timestamp().max(0) as u64;
        let key = window_key(bucket, now_secs, self.window_secs);
        let mut conn = self.client.connection();

        let (count,): (u64,) = tokio::time::timeout(
            self.client.command_timeout(),
            redis::pipe()
                .atomic()
                .incr(&key, 1u64)
                .expire(&key, self.window_secs as i64)
                .ignore()
                .query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::Timeout)??;

        Ok(RateLimitDecision::from_count(count, self.limit, now_secs, self.window_secs))
    }
}
