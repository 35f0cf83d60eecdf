/// Keyword mapping of document text onto standards
///
/// Each standard's confidence is the share of its keywords that occur in the
/// document. A standard counts as mapped at [`MAP_THRESHOLD`] or above, and
/// the matched keywords are kept as evidence.

use super::catalog::{Standard, StandardSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Minimum confidence for a standard to count as mapped
pub const MAP_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardMapping {
    pub standard_id: String,
    pub title: String,

    /// In `[0, 1]`
    pub confidence: f64,

    pub matched_keywords: Vec<String>,
}

impl StandardMapping {
    pub fn is_mapped(&self) -> bool {
        self.confidence >= MAP_THRESHOLD
    }
}

/// Lowercase alphanumeric words
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

pub fn map_standard(standard: &Standard, tokens: &HashSet<String>) -> StandardMapping {
    let matched_keywords: Vec<String> = standard
        .keywords
        .iter()
        .filter(|k| tokens.contains(**k))
        .map(|k| k.to_string())
        .collect();

    let confidence = if standard.keywords.is_empty() {
        0.0
    } else {
        (matched_keywords.len() as f64 / standard.keywords.len() as f64).clamp(0.0, 1.0)
    };

    StandardMapping {
        standard_id: standard.id.to_string(),
        title: standard.title.to_string(),
        confidence,
        matched_keywords,
    }
}

/// One mapping per standard in `set`, in catalog order
pub fn map_document(text: &str, set: StandardSet) -> Vec<StandardMapping> {
    let tokens = tokenize(text);
    set.standards().iter().map(|s| map_standard(s, &tokens)).collect()
}
