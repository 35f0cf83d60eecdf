/// Report assembly
///
/// A report is a JSON snapshot of a user's standing against one standard
/// set, built from every stored analysis of that set. For each standard the
/// best confidence across documents wins, and the documents that mapped to
/// it are listed as evidence. Standards below the mapping threshold are gaps.

use crate::models::analysis::UserAnalysis;
use crate::models::report::ReportKind;
use crate::standards::catalog::StandardSet;
use crate::standards::mapping::{StandardMapping, MAP_THRESHOLD};
use crate::standards::scoring::{self, FULL_CREDIT_CONFIDENCE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardStatus {
    Met,
    Partial,
    Gap,
}

impl StandardStatus {
    pub fn for_confidence(confidence: f64) -> Self {
        if confidence >= FULL_CREDIT_CONFIDENCE {
            StandardStatus::Met
        } else if confidence >= MAP_THRESHOLD {
            StandardStatus::Partial
        } else {
            StandardStatus::Gap
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub document_id: Uuid,
    pub filename: String,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardCoverage {
    pub standard_id: String,
    pub title: String,
    pub best_confidence: f64,
    pub status: StandardStatus,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub standard_id: String,
    pub title: String,
    pub best_confidence: f64,

    /// Catalog keywords no document matched
    pub missing_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub kind: ReportKind,
    pub standard_set: StandardSet,
    pub generated_at: DateTime<Utc>,
    pub overall_score: u32,
    pub coverage: f64,
    pub documents_total: i64,
    pub documents_analyzed: usize,
    pub standards_total: usize,
    pub standards_mapped: usize,

    /// Every standard for a compliance summary; only gaps for a gap analysis
    pub standards: Vec<StandardCoverage>,
    pub gaps: Vec<Gap>,
}

/// Set with the most analyses, ties going to catalog order
pub fn dominant_set(analyses: &[UserAnalysis]) -> StandardSet {
    StandardSet::ALL
        .into_iter()
        .rev()
        .max_by_key(|set| analyses.iter().filter(|a| a.standard_set == set.as_str()).count())
        .unwrap_or_default()
}

pub fn build_report(
    kind: ReportKind,
    set: StandardSet,
    analyses: &[UserAnalysis],
    documents_total: i64,
    generated_at: DateTime<Utc>,
) -> ReportPayload {
    let relevant: Vec<&UserAnalysis> = analyses
        .iter()
        .filter(|a| a.standard_set == set.as_str())
        .collect();

    let mut coverage_rows = Vec::with_capacity(set.standards().len());
    let mut best_mappings = Vec::with_capacity(set.standards().len());
    let mut gaps = Vec::new();

    for standard in set.standards() {
        let mut evidence: Vec<Evidence> = relevant
            .iter()
            .filter_map(|analysis| {
                analysis
                    .mappings
                    .iter()
                    .find(|m| m.standard_id == standard.id && m.is_mapped())
                    .map(|m| Evidence {
                        document_id: analysis.document_id,
                        filename: analysis.filename.clone(),
                        confidence: m.confidence,
                        matched_keywords: m.matched_keywords.clone(),
                    })
            })
            .collect();
        evidence.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let best_confidence = relevant
            .iter()
            .flat_map(|a| a.mappings.iter())
            .filter(|m| m.standard_id == standard.id)
            .map(|m| m.confidence)
            .fold(0.0_f64, f64::max);

        best_mappings.push(StandardMapping {
            standard_id: standard.id.to_string(),
            title: standard.title.to_string(),
            confidence: best_confidence,
            matched_keywords: Vec::new(),
        });

        let status = StandardStatus::for_confidence(best_confidence);
        if status == StandardStatus::Gap {
            let matched: Vec<&str> = relevant
                .iter()
                .flat_map(|a| a.mappings.iter())
                .filter(|m| m.standard_id == standard.id)
                .flat_map(|m| m.matched_keywords.iter().map(String::as_str))
                .collect();

            gaps.push(Gap {
                standard_id: standard.id.to_string(),
                title: standard.title.to_string(),
                best_confidence,
                missing_keywords: standard
                    .keywords
                    .iter()
                    .filter(|k| !matched.contains(*k))
                    .map(|k| k.to_string())
                    .collect(),
            });
        }

        coverage_rows.push(StandardCoverage {
            standard_id: standard.id.to_string(),
            title: standard.title.to_string(),
            best_confidence,
            status,
            evidence,
        });
    }

    if kind == ReportKind::GapAnalysis {
        coverage_rows.retain(|row| row.status == StandardStatus::Gap);
    }

    let score = scoring::score(set, &best_mappings);

    ReportPayload {
        kind,
        standard_set: set,
        generated_at,
        overall_score: score.score,
        coverage: score.coverage,
        documents_total,
        documents_analyzed: relevant.len(),
        standards_total: score.total,
        standards_mapped: score.mapped,
        standards: coverage_rows,
        gaps,
    }
}
