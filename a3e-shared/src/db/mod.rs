/// Postgres access for the API and the worker
///
/// - [`pool`]: pool settings, eager and lazy pools, health and stats
/// - [`migrations`]: the schema under `migrations/`, embedded at build time
///
/// The API migrates on startup; the worker only connects.
///
/// ```no_run
/// use a3e_shared::db::{migrations::run_migrations, pool::{create_pool, DatabaseConfig}};
///
/// # async fn boot(url: String) -> anyhow::Result<()> {
/// let pool = create_pool(DatabaseConfig { url, ..Default::default() }).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

pub mod migrations;
pub mod pool;
