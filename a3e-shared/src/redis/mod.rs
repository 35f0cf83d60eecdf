/// Redis integration
///
/// Used for request rate limiting. Everything here is optional at runtime:
/// callers hold an `Option<RedisClient>` and skip the feature when it is
/// `None`.
///
/// # Example
///
/// ```no_run
/// use a3e_shared::redis::{FixedWindowLimiter, RedisClient, RedisConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = RedisClient::connect(RedisConfig::new("redis://localhost:6379")).await?;
/// let limiter = FixedWindowLimiter::new(client, 10, 60);
///
/// let decision = limiter.hit("login:203.0.113.9").await?;
/// if !decision.allowed {
///     println!("retry in {}s", decision.retry_after_secs);
/// }
/// # Ok(())
/// # }
/// ```

pub mod client;
pub mod rate_limit;

pub use client::{RedisClient, RedisClientError, RedisConfig, RedisStats};
pub use rate_limit::{FixedWindowLimiter, RateLimitDecision};
