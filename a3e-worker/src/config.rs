/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
/// - `WORKER_CONCURRENCY`: Jobs run at once (default: 4)
/// - `WORKER_POLL_INTERVAL_MS`: Idle poll delay (default: 1000)
/// - `WORKER_NURTURE_INTERVAL_SECONDS`: Nurture scan period, `0` disables (default: 3600)
/// - `WORKER_STALE_AFTER_SECONDS`: Running jobs older than this are requeued on start (default: 900)
/// - `EMAIL_PROVIDERS`: Comma-separated, in priority order (default: `log`)
/// - `SENDGRID_API_KEY`, `MAILERSEND_API_KEY`, `POSTMARK_SERVER_TOKEN`
/// - `EMAIL_FROM`: Sender (default: `A³E <hello@mapmystandards.ai>`)
/// - `APP_URL`: Base for links in emails (default: `https://app.mapmystandards.ai`)
/// - `STORAGE_BACKEND`, `STORAGE_LOCAL_ROOT`, `S3_*`: Same as the API
/// - `LOG_FORMAT`: `json` for JSON logs

use a3e_shared::email::fallback::EmailSettings;
use a3e_shared::storage::StorageConfig;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_EMAIL_FROM: &str = "A³E <hello@mapmystandards.ai>";
pub const DEFAULT_APP_URL: &str = "https://app.mapmystandards.ai";

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,

    pub concurrency: usize,
    pub poll_interval: Duration,

    /// `None` turns the nurture scheduler off
    pub nurture_interval: Option<Duration>,

    pub stale_after: Duration,

    pub email: EmailSettings,
    pub email_from: String,
    pub app_url: String,

    pub storage: StorageConfig,
    pub json_logs: bool,
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

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let concurrency: usize = parse_or(&lookup, "WORKER_CONCURRENCY", 4)?;
        if concurrency == 0 {
            anyhow::bail!("WORKER_CONCURRENCY must be at least 1");
        }

        let nurture_secs: u64 = parse_or(&lookup, "WORKER_NURTURE_INTERVAL_SECONDS", 3600)?;

        let providers = lookup("EMAIL_PROVIDERS")
            .unwrap_or_else(|| "log".to_string())
            .split(',')
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            concurrency,
            poll_interval: Duration::from_millis(parse_or(&lookup, "WORKER_POLL_INTERVAL_MS", 1000)?),
            nurture_interval: (nurture_secs > 0).then(|| Duration::from_secs(nurture_secs)),
            stale_after: Duration::from_secs(parse_or(&lookup, "WORKER_STALE_AFTER_SECONDS", 900)?),
            email: EmailSettings {
                providers,
                sendgrid_api_key: lookup("SENDGRID_API_KEY"),
                mailersend_api_key: lookup("MAILERSEND_API_KEY"),
                postmark_server_token: lookup("POSTMARK_SERVER_TOKEN"),
            },
            email_from: lookup("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            app_url: lookup("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
            storage: StorageConfig::from_lookup(&lookup)?,
            json_logs: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }
}
