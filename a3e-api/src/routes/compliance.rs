/// Document analysis and the compliance summary
///
/// Analysis runs in the worker. `POST /api/documents/:id/analyze` moves the
/// document to `processing` and queues an `analyze_document` job; the result
/// lands in `document_analyses` and is read back with
/// `GET /api/documents/:id/analysis`.
///
/// `GET /api/compliance/summary` aggregates every stored analysis of the
/// caller, one block per standard set that has any.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::documents::{owned_document, parse_standard_set},
};
use a3e_shared::{
    auth::middleware::AuthContext,
    models::{
        analysis::{DocumentAnalysis, UserAnalysis},
        document::{Document, DocumentStatus},
        job::{Job, JobPayload},
        report::ReportKind,
    },
    quota::QuotaType,
    reports::build_report,
    standards::StandardSet,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    /// Overrides the set chosen at upload
    pub standard_set: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeAccepted {
    pub document_id: Uuid,
    pub job_id: Uuid,
    pub status: &'static str,
    pub standard_set: StandardSet,
}

#[derive(Debug, Serialize)]
pub struct SetSummary {
    pub standard_set: StandardSet,
    pub accreditor: &'static str,
    pub overall_score: u32,
    pub coverage: f64,
    pub documents_analyzed: usize,
    pub standards_total: usize,
    pub standards_mapped: usize,
    pub gaps: usize,
}

#[derive(Debug, Serialize)]
pub struct ComplianceSummary {
    pub documents_total: i64,
    pub documents_analyzed: usize,
    pub last_analyzed_at: Option<DateTime<Utc>>,
    pub sets: Vec<SetSummary>,
}

/// Queue an analysis
///
/// # Errors
///
/// - `402 Payment Required` / `403 Forbidden`: Access or monthly analysis quota
/// - `404 Not Found`: Not the caller's document
/// - `409 Conflict`: An analysis is already queued or running
pub async fn analyze_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<AnalyzeQuery>,
) -> ApiResult<(StatusCode, Json<AnalyzeAccepted>)> {
    let document = owned_document(&state, &auth, id).await?;

    let set = match query.standard_set.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => parse_standard_set(raw)?,
        None => document.get_standard_set(),
    };

    state.quota.enforce(auth.user_id, QuotaType::MonthlyAnalyses).await?;

    if !Document::mark_processing(&state.db, document.id, set).await? {
        return Err(ApiError::Conflict("Analysis already in progress".to_string()));
    }

    let job = match Job::enqueue(&state.db, &JobPayload::AnalyzeDocument { document_id: document.id }).await {
        Ok(job) => job,
        Err(e) => {
            let previous = document.get_status().unwrap_or(DocumentStatus::Uploaded);
            Document::set_status(&state.db, document.id, previous).await?;
            return Err(e.into());
        }
    };

    tracing::info!(
        user_id = %auth.user_id,
        document_id = %document.id,
        job_id = %job.id,
        standard_set = set.as_str(),
        "Analysis queued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeAccepted {
            document_id: document.id,
            job_id: job.id,
            status: DocumentStatus::Processing.as_str(),
            standard_set: set,
        }),
    ))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DocumentAnalysis>> {
    let document = owned_document(&state, &auth, id).await?;

    DocumentAnalysis::find_by_document(&state.db, document.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Document has no analysis yet (status: {})", document.status)))
}

/// Per-set scores over every analysis, in catalog order
pub fn summarize_analyses(analyses: &[UserAnalysis], documents_total: i64, now: DateTime<Utc>) -> ComplianceSummary {
    let sets = StandardSet::ALL
        .into_iter()
        .filter(|set| analyses.iter().any(|a| a.standard_set == set.as_str()))
        .map(|set| {
            let report = build_report(ReportKind::ComplianceSummary, set, analyses, documents_total, now);
            SetSummary {
                standard_set: set,
                accreditor: set.accreditor(),
                overall_score: report.overall_score,
                coverage: report.coverage,
                documents_analyzed: report.documents_analyzed,
                standards_total: report.standards_total,
                standards_mapped: report.standards_mapped,
                gaps: report.gaps.len(),
            }
        })
        .collect();

    ComplianceSummary {
        documents_total,
        documents_analyzed: analyses.len(),
        last_analyzed_at: analyses.iter().map(|a| a.analyzed_at).max(),
        sets,
    }
}

pub async fn compliance_summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ComplianceSummary>> {
    let analyses = DocumentAnalysis::list_for_user(&state.db, auth.user_id).await?;
    let documents_total = Document::count_by_user(&state.db, auth.user_id).await?;

    Ok(Json(summarize_analyses(&analyses, documents_total, Utc::now())))
}
