/// Redis connection handling
///
/// A thin wrapper over `redis::aio::ConnectionManager`, which reconnects on
/// its own. Redis is optional for A³E: when `REDIS_URL` is unset the API
/// runs without rate limiting.

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),

    #[error("Redis configuration error: {0}")]
    Config(String),

    #[error("Redis command timed out")]
    Timeout,
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            RedisClientError::Connection(err.to_string())
        } else {
            RedisClientError::Command(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,

    /// Upper bound for any single command
    pub command_timeout: Duration,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("url", &sanitize_url(&self.config.url))
            .finish()
    }
}

impl RedisClient {
    pub async fn connect(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::Config(format!("Invalid Redis URL: {e}")))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| RedisClientError::Connection(e.to_string()))?;

        tracing::info!(url = %sanitize_url(&config.url), "Connected to Redis");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// A cloned handle; clones share the underlying multiplexed connection
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn command_timeout(&self) -> Duration {
        self.config.command_timeout
    }

    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.connection();
        let reply: String = tokio::time::timeout(
            self.config.command_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::Timeout)??;

        Ok(reply == "PONG")
    }

    pub async fn stats(&self) -> RedisStats {
        RedisStats {
            healthy: self.ping().await.unwrap_or(false),
            url: sanitize_url(&self.config.url),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RedisStats {
    pub healthy: bool,
    pub url: String,
}

/// Masks credentials in a Redis URL for logging
pub fn sanitize_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***@{}", &url[..scheme_end + 3], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
