/// Compliance score over a standard set
///
/// `score = round(100 * mean(min(1, confidence / FULL_CREDIT_CONFIDENCE)))`
/// taken over every standard in the set, so unmapped standards pull the
/// score down. `coverage` is the mapped share of the set.

use super::catalog::StandardSet;
use super::mapping::{StandardMapping, MAP_THRESHOLD};
use serde::{Deserialize, Serialize};

/// Confidence at which a standard earns full credit
pub const FULL_CREDIT_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceScore {
    /// 0..=100
    pub score: u32,
    /// 0..=1
    pub coverage: f64,
    pub mapped: usize,
    pub total: usize,
}

fn credit(confidence: f64) -> f64 {
    (confidence / FULL_CREDIT_CONFIDENCE).clamp(0.0, 1.0)
}

/// Scores `mappings` against `set`; standards without a mapping count as 0
pub fn score(set: StandardSet, mappings: &[StandardMapping]) -> ComplianceScore {
    let standards = set.standards();
    let total = standards.len();
    if total == 0 {
        return ComplianceScore {
            score: 0,
            coverage: 0.0,
            mapped: 0,
            total: 0,
        };
    }

    let confidence_of = |id: &str| {
        mappings
            .iter()
            .filter(|m| m.standard_id == id)
            .map(|m| m.confidence)
            .fold(0.0_f64, f64::max)
    };

    let mut credit_sum = 0.0;
    let mut mapped = 0;
    for standard in standards {
        let confidence = confidence_of(standard.id);
        if confidence >= MAP_THRESHOLD {
            mapped += 1;
        }
        credit_sum += credit(confidence);
    }

    ComplianceScore {
        score: (100.0 * credit_sum / total as f64).round() as u32,
        coverage: mapped as f64 / total as f64,
        mapped,
        total,
    }
}

/// One-line human summary stored with an analysis
pub fn summarize(set: StandardSet, score: &ComplianceScore) -> String {
    format!(
        "Mapped {} of {} {} standards; compliance score {}/100.",
        score.mapped,
        score.total,
        set.as_str().to_uppercase(),
        score.score
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(id: &str, confidence: f64) -> StandardMapping {
        StandardMapping {
            standard_id: id.to_string(),
            title: id.to_string(),
            confidence,
            matched_keywords: vec![],
        }
    }

    #[test]
    fn test_no_mappings_scores_zero() {
        let result = score(StandardSet::Hlc, &[]);
        assert_eq!(result.score, 0);
        assert_eq!(result.coverage, 0.0);
        assert_eq!(result.total, 5);
    }

    #[test]
    fn test_full_credit_is_capped() {
        let all: Vec<_> = StandardSet::Hlc
            .standards()
            .iter()
            .map(|s| mapping(s.id, 1.0))
            .collect();
        let result = score(StandardSet::Hlc, &all);
        assert_eq!(result.score, 100);
        assert_eq!(result.coverage, 1.0);
        assert_eq!(result.mapped, 5);
    }

    #[test]
    fn test_partial_score() {
        // (1 + 0.5 + 0 + 0 + 0) / 5 = 0.3
        let mappings = vec![mapping("HLC-1", 0.6), mapping("HLC-2", 0.3), mapping("HLC-3", 0.0)];
        let result = score(StandardSet::Hlc, &mappings);
        assert_eq!(result.score, 30);
        assert_eq!(result.mapped, 2);
        assert!((result.coverage - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_foreign_mappings_ignored() {
        let result = score(StandardSet::Hlc, &[mapping("SACSCOC-1", 1.0)]);
        assert_eq!(result.score, 0);
        assert_eq!(result.mapped, 0);
    }

    #[test]
    fn test_summary() {
        let result = score(StandardSet::Hlc, &[mapping("HLC-1", 0.6)]);
        assert_eq!(
            summarize(StandardSet::Hlc, &result),
            "Mapped 1 of 5 HLC standards; compliance score 20/100."
        );
    }
}
