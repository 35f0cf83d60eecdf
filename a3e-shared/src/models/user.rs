/// User model and database operations
///
/// A user is an institutional account holder. Besides credentials, the row
/// carries the trial window, the Stripe linkage, and running usage counters
/// that quotas are checked against.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255),
///     institution_name VARCHAR(255),
///     role VARCHAR(20) NOT NULL DEFAULT 'user',
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     plan VARCHAR(30) NOT NULL DEFAULT 'trial',
///     subscription_status VARCHAR(30) NOT NULL DEFAULT 'trialing',
///     stripe_customer_id VARCHAR(255) UNIQUE,
///     stripe_subscription_id VARCHAR(255),
///     trial_started_at TIMESTAMPTZ NOT NULL,
///     trial_ends_at TIMESTAMPTZ NOT NULL,
///     documents_uploaded INTEGER NOT NULL DEFAULT 0,
///     analyses_run INTEGER NOT NULL DEFAULT 0,
///     reports_generated INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ,
///     CHECK (trial_ends_at > trial_started_at)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use a3e_shared::models::user::{CreateUser, User};
/// use a3e_shared::billing::trial::TrialWindow;
/// # use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let user = User::create(
///     &pool,
///     CreateUser {
///         email: "registrar@college.edu".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         name: Some("Dana Registrar".to_string()),
///         institution_name: Some("Example College".to_string()),
///         trial: TrialWindow::starting_now(14)?,
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&pool, "REGISTRAR@college.edu").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use crate::billing::trial::TrialWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, name, institution_name, role, email_verified, \
     plan, subscription_status, stripe_customer_id, stripe_subscription_id, \
     trial_started_at, trial_ends_at, documents_uploaded, analyses_run, reports_generated, \
     created_at, updated_at, last_login_at";

/// Subscription plans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Implicit plan during the free trial
    Trial,

    /// Single-department plan
    Starter,

    /// Whole-institution accreditation office
    Professional,

    /// Multi-campus systems, unlimited usage
    Institution,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Trial => "trial",
            Plan::Starter => "starter",
            Plan::Professional => "professional",
            Plan::Institution => "institution",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(Plan::Trial),
            "starter" => Some(Plan::Starter),
            "professional" => Some(Plan::Professional),
            "institution" => Some(Plan::Institution),
            _ => None,
        }
    }

    /// Plans that can be purchased
    pub fn paid() -> [Plan; 3] {
        [Plan::Starter, Plan::Professional, Plan::Institution]
    }
}

/// Subscription state mirrored from Stripe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Incomplete,
    None,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::None => "none",
        }
    }

    /// Parses Stripe's status strings
    ///
    /// `incomplete_expired` and `unpaid` collapse into the nearest local
    /// state; anything unknown maps to `None`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "trialing" => SubscriptionStatus::Trialing,
            "active" => SubscriptionStatus::Active,
            "past_due" | "unpaid" => SubscriptionStatus::PastDue,
            "canceled" | "incomplete_expired" => SubscriptionStatus::Canceled,
            "incomplete" => SubscriptionStatus::Incomplete,
            _ => SubscriptionStatus::None,
        }
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

/// Per-user usage counter columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageCounter {
    DocumentsUploaded,
    AnalysesRun,
    ReportsGenerated,
}

impl UsageCounter {
    fn column(&self) -> &'static str {
        match self {
            UsageCounter::DocumentsUploaded => "documents_uploaded",
            UsageCounter::AnalysesRun => "analyses_run",
            UsageCounter::ReportsGenerated => "reports_generated",
        }
    }
}

/// User account row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Case-insensitive and unique (CITEXT)
    pub email: String,

    /// Argon2id PHC string; never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub name: Option<String>,
    pub institution_name: Option<String>,
    pub role: String,
    pub email_verified: bool,

    /// See [`Plan`]
    pub plan: String,

    /// See [`SubscriptionStatus`]
    pub subscription_status: String,

    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,

    pub trial_started_at: DateTime<Utc>,
    pub trial_ends_at: DateTime<Utc>,

    pub documents_uploaded: i32,
    pub analyses_run: i32,
    pub reports_generated: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,

    /// Already-hashed password
    pub password_hash: String,

    pub name: Option<String>,
    pub institution_name: Option<String>,
    pub trial: TrialWindow,
}

/// Profile fields a user may edit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    /// `Some(None)` clears the value
    pub name: Option<Option<String>>,
    pub institution_name: Option<Option<String>>,
}

impl User {
    pub fn get_plan(&self) -> Plan {
        Plan::from_str(&self.plan).unwrap_or(Plan::Trial)
    }

    pub fn get_subscription_status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_str(&self.subscription_status)
    }

    pub fn get_role(&self) -> UserRole {
        if self.role == "admin" {
            UserRole::Admin
        } else {
            UserRole::User
        }
    }

    /// Trial window as stored
    ///
    /// The DB CHECK guarantees `trial_ends_at > trial_started_at`, so this
    /// only falls back to a zero-day window for rows written around the
    /// constraint.
    pub fn trial_window(&self) -> TrialWindow {
        TrialWindow::new(self.trial_started_at, self.trial_ends_at)
            .unwrap_or_else(|_| TrialWindow::expired_at(self.trial_started_at))
    }

    /// Whether paid features may be used right now
    ///
    /// True while the trial is running or the subscription is active or
    /// trialing on Stripe's side. `past_due` keeps access during dunning.
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        match self.get_subscription_status() {
            SubscriptionStatus::Active | SubscriptionStatus::PastDue => true,
            SubscriptionStatus::Trialing => self.trial_window().is_active(now) || self.stripe_subscription_id.is_some(),
            SubscriptionStatus::Canceled | SubscriptionStatus::Incomplete | SubscriptionStatus::None => {
                self.trial_window().is_active(now)
            }
        }
    }

    /// Creates a new user in the trialing state
    ///
    /// # Errors
    ///
    /// Unique violation on `email` when the address is taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, password_hash, name, institution_name, trial_started_at, trial_ends_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.email.trim())
            .bind(data.password_hash)
            .bind(data.name)
            .bind(data.institution_name)
            .bind(data.trial.started_at())
            .bind(data.trial.ends_at())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive lookup (CITEXT)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_stripe_customer(
        pool: &PgPool,
        customer_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE stripe_customer_id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(customer_id)
            .fetch_optional(pool)
            .await
    }

    /// Updates name / institution; `None` fields are left untouched
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.institution_name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", institution_name = ${}", bind_count));
        }
        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);
        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(institution) = data.institution_name {
            q = q.bind(institution);
        }

        q.fetch_optional(pool).await
    }

    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_stripe_customer(
        pool: &PgPool,
        id: Uuid,
        customer_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET stripe_customer_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(customer_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records the subscription state after a checkout or webhook
    ///
    /// `subscription_id = None` keeps the stored id.
    pub async fn update_subscription(
        pool: &PgPool,
        id: Uuid,
        plan: Plan,
        status: SubscriptionStatus,
        subscription_id: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users
             SET plan = $2,
                 subscription_status = $3,
                 stripe_subscription_id = COALESCE($4, stripe_subscription_id),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(plan.as_str())
            .bind(status.as_str())
            .bind(subscription_id)
            .fetch_optional(pool)
            .await
    }

    /// Bumps one usage counter inside the caller's transaction
    pub async fn increment_counter(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        counter: UsageCounter,
        by: i32,
    ) -> Result<(), sqlx::Error> {
        let column = counter.column();
        let query = format!(
            "UPDATE users SET {column} = {column} + $2, updated_at = NOW() WHERE id = $1"
        );

        sqlx::query(&query)
            .bind(id)
            .bind(by)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Users still inside their trial who have not subscribed
    ///
    /// Feeds the nurture scheduler.
    pub async fn list_trialing(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE subscription_status = 'trialing'
               AND stripe_subscription_id IS NULL
               AND trial_ends_at > $1
             ORDER BY trial_ends_at ASC"
        );

        sqlx::query_as::<_, User>(&query).bind(now).fetch_all(pool).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
