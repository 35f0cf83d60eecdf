/// Database models for A³E
///
/// Row types and their queries. Every model follows the same shape: a
/// `sqlx::FromRow` struct, a `CreateX` input where inserts need one, and
/// associated async functions taking `&PgPool`.
///
/// # Models
///
/// - `user`: accounts, trial window, Stripe linkage, usage counters
/// - `session`: refresh-token sessions with rotation
/// - `password_reset`: single-use reset tokens
/// - `usage_event`: append-only usage log for quotas
/// - `document`: uploaded file metadata
/// - `analysis`: standards-mapping result per document
/// - `report`: generated report snapshots
/// - `job`: background job queue records
/// - `email_delivery`: idempotency keys for tracked emails
///
/// # Example
///
/// ```no_run
/// use a3e_shared::models::user::User;
/// use a3e_shared::models::document::Document;
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// if let Some(user) = User::find_by_id(&pool, user_id).await? {
///     let docs = Document::list_by_user(&pool, user.id, 20, 0).await?;
///     println!("{} has {} documents", user.email, docs.len());
/// }
/// # Ok(())
/// # }
/// ```

pub mod analysis;
pub mod document;
pub mod email_delivery;
pub mod job;
pub mod password_reset;
pub mod report;
pub mod session;
pub mod usage_event;
pub mod user;
