use super::types::{ExtractionWarning, OcrWordResult, RecognitionResult};

/// Recognition confidence thresholds (engine scale, 0-100)
pub mod thresholds {
    /// Below this a page is reported as low confidence.
    pub const LOW_PAGE: f32 = 50.0;

    /// Fewer non-whitespace characters than this and the page counts as empty.
    pub const MIN_PAGE_CHARS: usize = 3;
}

/// Page confidence: mean of token confidences. A page with no tokens has 0.
pub fn page_confidence(words: &[OcrWordResult]) -> f32 {
    if words.is_empty() {
        return 0.0;
    }
    let sum: f32 = words.iter().map(|w| w.confidence.clamp(0.0, 100.0)).sum();
    sum / words.len() as f32
}

/// Document recognition confidence: unweighted mean over all pages.
/// An empty page pulls the mean down without zeroing it.
pub fn document_confidence(pages: &[RecognitionResult]) -> f32 {
    if pages.is_empty() {
        return 0.0;
    }
    let sum: f32 = pages.iter().map(|p| p.confidence).sum();
    sum / pages.len() as f32
}

/// Whether a page produced no usable text.
pub fn is_empty_page(result: &RecognitionResult) -> bool {
    result.text.chars().filter(|c| !c.is_whitespace()).count() < thresholds::MIN_PAGE_CHARS
}

/// Page-level warnings. Pages are reported 1-based.
pub fn analyze_page(result: &RecognitionResult, low_confidence: f32) -> Vec<ExtractionWarning> {
    let page = result.page_index + 1;
    if is_empty_page(result) {
        return vec![ExtractionWarning::EmptyPage { page }];
    }
    if result.confidence < low_confidence {
        return vec![ExtractionWarning::LowConfidencePage {
            page,
            confidence: result.confidence,
        }];
    }
    vec![]
}
