/// Usage summary
///
/// `GET /api/usage` returns lifetime counters, this month's per-kind totals,
/// each quota with its remaining headroom, and the most recent events.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::auth::UsageCounters,
};
use a3e_shared::{
    auth::middleware::AuthContext,
    models::{
        usage_event::{MonthlyUsage, UsageEvent},
        user::User,
    },
    quota::{QuotaCheckResult, QuotaType},
};
use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::Serialize;

/// Events included in the summary
pub const RECENT_EVENTS: i64 = 20;

#[derive(Debug, Serialize)]
pub struct QuotaView {
    pub quota: QuotaType,

    #[serde(flatten)]
    pub check: QuotaCheckResult,
}

#[derive(Debug, Serialize)]
pub struct UsageSummary {
    pub plan: String,
    pub has_access: bool,
    pub counters: UsageCounters,
    pub this_month: MonthlyUsage,
    pub quotas: Vec<QuotaView>,
    pub recent_events: Vec<UsageEvent>,
}

pub async fn usage_summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UsageSummary>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    let this_month = UsageEvent::monthly_summary(&state.db, user.id).await?;
    let quotas = state
        .quota
        .snapshot(&user)
        .await?
        .into_iter()
        .map(|(quota, check)| QuotaView { quota, check })
        .collect();
    let recent_events = UsageEvent::list_recent(&state.db, user.id, RECENT_EVENTS).await?;

    Ok(Json(UsageSummary {
        plan: user.get_plan().as_str().to_string(),
        has_access: user.has_access(Utc::now()),
        counters: UsageCounters {
            documents_uploaded: user.documents_uploaded,
            analyses_run: user.analyses_run,
            reports_generated: user.reports_generated,
        },
        this_month,
        quotas,
        recent_events,
    }))
}
