/// Generated reports
///
/// A report is a stored snapshot built from the caller's analyses at the
/// time of the request (see `a3e_shared::reports`). Creating one counts
/// against the monthly report quota and queues a `report_ready` email.
///
/// # Endpoints
///
/// - `POST /api/reports` - `{ "kind": "gap_analysis", "title": "...", "standard_set": "hlc" }`
/// - `GET /api/reports` - List without payloads
/// - `GET /api/reports/:id`
/// - `DELETE /api/reports/:id`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{documents::parse_standard_set, Pagination},
};
use a3e_shared::{
    auth::middleware::AuthContext,
    email::templates::EmailTemplate,
    models::{
        analysis::DocumentAnalysis,
        document::Document,
        job::{Job, JobPayload},
        report::{Report, ReportKind, ReportSummary},
        usage_event::{UsageEvent, UsageKind},
    },
    quota::QuotaType,
    reports::{build_report, dominant_set},
    standards::StandardSet,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportRequest {
    #[serde(default = "default_kind")]
    pub kind: ReportKind,

    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,

    /// Defaults to the set most of the caller's analyses use
    pub standard_set: Option<String>,
}

fn default_kind() -> ReportKind {
    ReportKind::ComplianceSummary
}

#[derive(Debug, Serialize)]
pub struct ReportList {
    pub reports: Vec<ReportSummary>,
    pub limit: i64,
    pub offset: i64,
}

/// Caller's title, or e.g. `Gap Analysis (HLC)`
pub fn report_title(kind: ReportKind, set: StandardSet, requested: Option<&str>) -> String {
    match requested.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => title.to_string(),
        None => format!("{} ({})", kind.default_title(), set.as_str().to_ascii_uppercase()),
    }
}

/// Generate a report
///
/// # Errors
///
/// - `400 Bad Request`: Unknown kind or standard set
/// - `402 Payment Required` / `403 Forbidden`: Access or monthly report quota
pub async fn create_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    req.validate()?;

    let requested_set = req
        .standard_set
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_standard_set)
        .transpose()?;

    state.quota.enforce(auth.user_id, QuotaType::MonthlyReports).await?;

    let analyses = DocumentAnalysis::list_for_user(&state.db, auth.user_id).await?;
    let documents_total = Document::count_by_user(&state.db, auth.user_id).await?;
    let set = requested_set.unwrap_or_else(|| dominant_set(&analyses));

    let payload = build_report(req.kind, set, &analyses, documents_total, Utc::now());
    let body = serde_json::to_value(&payload)
        .map_err(|e| ApiError::InternalError(format!("Report serialization failed: {}", e)))?;
    let title = report_title(req.kind, set, req.title.as_deref());

    let report = Report::create(&state.db, auth.user_id, req.kind, &title, body).await?;

    UsageEvent::record_with_counter(
        &state.db,
        auth.user_id,
        UsageKind::Report,
        serde_json::json!({ "report_id": report.id, "kind": req.kind.as_str() }),
    )
    .await?;

    let email = JobPayload::SendEmail {
        to: auth.email.clone(),
        user_id: Some(auth.user_id),
        template: EmailTemplate::ReportReady {
            report_id: report.id,
            title: report.title.clone(),
        },
        dedupe_key: None,
    };
    if let Err(e) = Job::enqueue(&state.db, &email).await {
        tracing::warn!(error = %e, report_id = %report.id, "Failed to enqueue report email");
    }

    tracing::info!(
        user_id = %auth.user_id,
        report_id = %report.id,
        kind = req.kind.as_str(),
        standard_set = set.as_str(),
        overall_score = payload.overall_score,
        "Report generated"
    );

    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<ReportList>> {
    let (limit, offset) = page.resolve();
    let reports = Report::list_by_user(&state.db, auth.user_id, limit, offset).await?;

    Ok(Json(ReportList {
        reports,
        limit,
        offset,
    }))
}

pub async fn get_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Report>> {
    Report::find_for_user(&state.db, id, auth.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Report not found".to_string()))
}

pub async fn delete_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Report::delete_for_user(&state.db, id, auth.user_id).await? {
        return Err(ApiError::NotFound("Report not found".to_string()));
    }

    tracing::info!(user_id = %auth.user_id, report_id = %id, "Report deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_title() {
        assert_eq!(
            report_title(ReportKind::GapAnalysis, StandardSet::Hlc, None),
            "Gap Analysis (HLC)"
        );
        assert_eq!(
            report_title(ReportKind::ComplianceSummary, StandardSet::Sacscoc, Some("  ")),
            "Compliance Summary (SACSCOC)"
        );
        assert_eq!(
            report_title(ReportKind::ComplianceSummary, StandardSet::Sacscoc, Some(" Fifth-Year Review ")),
            "Fifth-Year Review"
        );
    }

    #[test]
    fn test_request_defaults_to_summary() {
        let req: CreateReportRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(req.kind, ReportKind::ComplianceSummary);

        let gap: CreateReportRequest =
            serde_json::from_value(serde_json::json!({ "kind": "gap_analysis" })).unwrap();
        assert_eq!(gap.kind, ReportKind::GapAnalysis);

        assert!(serde_json::from_value::<CreateReportRequest>(serde_json::json!({ "kind": "audit" })).is_err());
    }
}
