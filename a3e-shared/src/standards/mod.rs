/// Standards catalog, keyword mapping and compliance scoring
///
/// [`analyze`] is the whole pipeline the worker runs for a document:
/// extract text, map it onto every standard of the chosen set, score.
///
/// # Example
///
/// ```
/// use a3e_shared::standards::{analyze, catalog::StandardSet};
///
/// let text = b"The Board of Trustees adopted bylaws on governance and oversight.";
/// let analysis = analyze(text, Some("txt"), StandardSet::Sacscoc);
///
/// assert!(analysis.mappings.iter().any(|m| m.standard_id == "SACSCOC-4" && m.is_mapped()));
/// assert!(analysis.score.score > 0);
/// ```

pub mod catalog;
pub mod extract;
pub mod mapping;
pub mod scoring;

pub use catalog::{find_standard, Standard, StandardSet};
pub use mapping::StandardMapping;
pub use scoring::ComplianceScore;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAnalysisResult {
    pub mappings: Vec<StandardMapping>,
    pub score: ComplianceScore,
    pub summary: String,
}

pub fn analyze(data: &[u8], extension: Option<&str>, set: StandardSet) -> DocumentAnalysisResult {
    let text = extract::extract_text(data, extension);
    let mappings = mapping::map_document(&text, set);
    let score = scoring::score(set, &mappings);
    let summary = scoring::summarize(set, &score);

    DocumentAnalysisResult {
        mappings,
        score,
        summary,
    }
}
