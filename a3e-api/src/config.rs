/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST` / `API_PORT`: Bind address (default: 0.0.0.0:8080)
/// - `CORS_ORIGINS`: Comma-separated origins, `*` for permissive (default: `*`)
/// - `PRODUCTION`: Enables HSTS when `true`
/// - `JWT_SECRET`: Secret key for JWT signing (required, ≥ 32 chars)
/// - `JWT_ACCESS_TTL_SECONDS` / `JWT_REFRESH_TTL_SECONDS`: Token lifetimes
/// - `REDIS_URL`: Enables rate limiting when set
/// - `RATE_LIMIT_REQUESTS` / `RATE_LIMIT_WINDOW_SECONDS`: Auth route limits (default: 10 / 60)
/// - `STORAGE_BACKEND`, `STORAGE_LOCAL_ROOT`, `S3_*`: Document storage
/// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`, `STRIPE_PRICE_*`: Billing
/// - `LOG_FORMAT`: `json` for JSON logs (default: text)
/// - `RUST_LOG`: Log filter (default: info)
///
/// # Example
///
/// ```no_run
/// use a3e_api::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}:{}", config.api.host, config.api.port);
/// # Ok(())
/// # }
/// ```

use a3e_shared::auth::jwt::{ACCESS_TOKEN_TTL_SECONDS, REFRESH_TOKEN_TTL_SECONDS};
use a3e_shared::billing::PriceIds;
use a3e_shared::storage::StorageConfig;
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Redis and rate limiting
    pub redis: RedisSettings,

    /// Document storage backend
    pub storage: StorageConfig,

    /// Stripe credentials and prices
    pub stripe: StripeConfig,

    /// Emit JSON logs
    pub json_logs: bool,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS)
    pub production: bool,

    /// Behind a reverse proxy that appends the peer to `X-Forwarded-For`
    pub trust_proxy: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// Rate limiting is disabled when unset
    pub url: Option<String>,

    /// Requests per window on login, register and forgot-password
    pub rate_limit_requests: u32,
    pub rate_limit_window_seconds: u64,
}

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    /// Mock payments when unset
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub prices: PriceIds,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value: {e}")),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Builds configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret =
            lookup("JWT_SECRET").ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let storage = StorageConfig::from_lookup(&lookup)?;

        Ok(Self {
            api: ApiConfig {
                host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "API_PORT", 8080)?,
                cors_origins,
                production: parse_bool(lookup("PRODUCTION")),
                trust_proxy: parse_bool(lookup("TRUST_PROXY")),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_seconds: parse_or(&lookup, "JWT_ACCESS_TTL_SECONDS", ACCESS_TOKEN_TTL_SECONDS)?,
                refresh_ttl_seconds: parse_or(&lookup, "JWT_REFRESH_TTL_SECONDS", REFRESH_TOKEN_TTL_SECONDS)?,
            },
            redis: RedisSettings {
                url: lookup("REDIS_URL"),
                rate_limit_requests: parse_or(&lookup, "RATE_LIMIT_REQUESTS", 10)?,
                rate_limit_window_seconds: parse_or(&lookup, "RATE_LIMIT_WINDOW_SECONDS", 60)?,
            },
            storage,
            stripe: StripeConfig {
                secret_key: lookup("STRIPE_SECRET_KEY"),
                webhook_secret: lookup("STRIPE_WEBHOOK_SECRET"),
                prices: PriceIds {
                    starter: lookup("STRIPE_PRICE_STARTER"),
                    professional: lookup("STRIPE_PRICE_PROFESSIONAL"),
                    institution: lookup("STRIPE_PRICE_INSTITUTION"),
                },
            },
            json_logs: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| vars.get(key).map(|v| v.to_string())
    }

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgresql://localhost/a3e_test"),
            ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&base())).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(!config.api.production);
        assert!(!config.api.trust_proxy);
        assert_eq!(config.jwt.access_ttl_seconds, 3600);
        assert_eq!(config.redis.url, None);
        assert_eq!(config.redis.rate_limit_requests, 10);
        assert!(matches!(config.storage, StorageConfig::Local { .. }));
        assert!(config.stripe.secret_key.is_none());
        assert!(!config.json_logs);
    }

    #[test]
    fn test_overrides() {
        let mut vars = base();
        vars.insert("API_PORT", "9000");
        vars.insert("CORS_ORIGINS", "https://app.mapmystandards.ai, https://mapmystandards.ai");
        vars.insert("PRODUCTION", "true");
        vars.insert("TRUST_PROXY", "1");
        vars.insert("STRIPE_PRICE_STARTER", "price_s");
        vars.insert("LOG_FORMAT", "JSON");

        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.cors_origins.len(), 2);
        assert!(config.api.production);
        assert!(config.api.trust_proxy);
        assert_eq!(config.stripe.prices.starter.as_deref(), Some("price_s"));
        assert!(config.json_logs);
    }

    #[test]
    fn test_required_and_invalid() {
        let mut vars = base();
        vars.insert("JWT_SECRET", "short");
        assert!(Config::from_lookup(lookup(&vars)).is_err());

        let mut vars = base();
        vars.remove("DATABASE_URL");
        assert!(Config::from_lookup(lookup(&vars)).is_err());

        let mut vars = base();
        vars.insert("API_PORT", "eighty");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("API_PORT"));
    }
}
