/// Plan quotas
///
/// | Plan         | Documents | Analyses / month | Reports / month |
/// |--------------|-----------|------------------|-----------------|
/// | trial        | 10        | 20               | 5               |
/// | starter      | 50        | 100              | 20              |
/// | professional | 500       | 1000             | 100             |
/// | institution  | unlimited | unlimited        | unlimited       |
///
/// Documents count what is currently stored; analyses and reports count
/// usage events since the first of the month (UTC).
///
/// Before any limit is looked at, the account must have access: an expired
/// trial without a live subscription is refused with
/// [`QuotaError::PaymentRequired`].
///
/// # Example
///
/// ```no_run
/// use a3e_shared::quota::{QuotaEnforcer, QuotaType};
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let enforcer = QuotaEnforcer::new(pool);
/// enforcer.enforce(user_id, QuotaType::Documents).await?;
/// // ... store the upload
/// # Ok(())
/// # }
/// ```

use crate::models::document::Document;
use crate::models::usage_event::{UsageEvent, UsageKind};
use crate::models::user::{Plan, User};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("{} limit reached ({current}/{limit})", .quota_type.as_str())]
    LimitExceeded {
        quota_type: QuotaType,
        limit: u32,
        current: u32,
    },

    #[error("Trial has ended; a subscription is required")]
    PaymentRequired,

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaType {
    Documents,
    MonthlyAnalyses,
    MonthlyReports,
}

impl QuotaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaType::Documents => "Document",
            QuotaType::MonthlyAnalyses => "Monthly analysis",
            QuotaType::MonthlyReports => "Monthly report",
        }
    }
}

/// Per-plan limits; `None` is unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaLimits {
    pub documents: Option<u32>,
    pub analyses_per_month: Option<u32>,
    pub reports_per_month: Option<u32>,
}

impl QuotaLimits {
    pub fn for_plan(plan: Plan) -> Self {
        let (documents, analyses, reports) = match plan {
            Plan::Trial => (Some(10), Some(20), Some(5)),
            Plan::Starter => (Some(50), Some(100), Some(20)),
            Plan::Professional => (Some(500), Some(1_000), Some(100)),
            Plan::Institution => (None, None, None),
        };

        QuotaLimits {
            documents,
            analyses_per_month: analyses,
            reports_per_month: reports,
        }
    }

    pub fn get(&self, quota_type: QuotaType) -> Option<u32> {
        match quota_type {
            QuotaType::Documents => self.documents,
            QuotaType::MonthlyAnalyses => self.analyses_per_month,
            QuotaType::MonthlyReports => self.reports_per_month,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaCheckResult {
    pub allowed: bool,
    pub current: u32,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
}

impl QuotaCheckResult {
    /// Compares usage against a limit; the next unit is allowed while
    /// `current < limit`
    pub fn evaluate(current: u32, limit: Option<u32>) -> Self {
        match limit {
            None => QuotaCheckResult {
                allowed: true,
                current,
                limit: None,
                remaining: None,
            },
            Some(limit) => QuotaCheckResult {
                allowed: current < limit,
                current,
                limit: Some(limit),
                remaining: Some(limit.saturating_sub(current)),
            },
        }
    }
}

/// Access gate applied before any limit
pub fn ensure_access(user: &User, now: DateTime<Utc>) -> Result<(), QuotaError> {
    if user.has_access(now) {
        Ok(())
    } else {
        Err(QuotaError::PaymentRequired)
    }
}

/// Checks quotas against live counts in the database
#[derive(Clone)]
pub struct QuotaEnforcer {
    db: PgPool,
}

impl QuotaEnforcer {
    pub fn new(db: PgPool) -> Self {
        QuotaEnforcer { db }
    }

    async fn current_usage(&self, user_id: Uuid, quota_type: QuotaType) -> Result<u32, sqlx::Error> {
        let count = match quota_type {
            QuotaType::Documents => Document::count_by_user(&self.db, user_id).await?,
            QuotaType::MonthlyAnalyses => {
                UsageEvent::count_this_month(&self.db, user_id, UsageKind::Analysis).await?
            }
            QuotaType::MonthlyReports => {
                UsageEvent::count_this_month(&self.db, user_id, UsageKind::Report).await?
            }
        };

        Ok(u32::try_from(count.max(0)).unwrap_or(u32::MAX))
    }

    pub async fn check(&self, user: &User, quota_type: QuotaType) -> Result<QuotaCheckResult, QuotaError> {
        ensure_access(user, Utc::now())?;

        let limit = QuotaLimits::for_plan(user.get_plan()).get(quota_type);
        let current = self.current_usage(user.id, quota_type).await?;

        Ok(QuotaCheckResult::evaluate(current, limit))
    }

    /// Fails with `PaymentRequired` or `LimitExceeded` when the next unit
    /// would not be allowed
    pub async fn enforce(&self, user_id: Uuid, quota_type: QuotaType) -> Result<QuotaCheckResult, QuotaError> {
        let user = User::find_by_id(&self.db, user_id)
            .await?
            .ok_or(QuotaError::UserNotFound(user_id))?;

        let result = self.check(&user, quota_type).await?;
        if !result.allowed {
            return Err(QuotaError::LimitExceeded {
                quota_type,
                limit: result.limit.unwrap_or(0),
                current: result.current,
            });
        }

        Ok(result)
    }

    /// All three checks for the usage endpoint
    pub async fn snapshot(&self, user: &User) -> Result<Vec<(QuotaType, QuotaCheckResult)>, QuotaError> {
        let limits = QuotaLimits::for_plan(user.get_plan());
        let mut out = Vec::with_capacity(3);

        for quota_type in [QuotaType::Documents, QuotaType::MonthlyAnalyses, QuotaType::MonthlyReports] {
            let current = self.current_usage(user.id, quota_type).await?;
            out.push((quota_type, QuotaCheckResult::evaluate(current, limits.get(quota_type))));
        }

        Ok(out)
    }
}
