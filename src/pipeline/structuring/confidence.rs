use super::types::FieldName;
use crate::pipeline_config::PipelineConfig;

/// Fraction of the target fields found, 0.0-1.0.
pub fn completeness(found_fields: usize) -> f32 {
    found_fields.min(FieldName::ALL.len()) as f32 / FieldName::ALL.len() as f32
}

/// Combined score, 0-100: weighted sum of recognition confidence and completeness.
///
/// Both weights are non-negative, so the score never decreases when either
/// input increases.
pub fn compute_confidence_score(
    recognition_confidence: f32,
    found_fields: usize,
    config: &PipelineConfig,
) -> f32 {
    let (w_recognition, w_completeness) = config.score_weights();
    let recognition = recognition_confidence.clamp(0.0, 100.0);
    let score = w_recognition * recognition + w_completeness * completeness(found_fields) * 100.0;
    (score * 100.0).round() / 100.0
}

/// Unreadable scan: recognition AND completeness both below their minimums.
pub fn is_poor_quality(
    recognition_confidence: f32,
    found_fields: usize,
    config: &PipelineConfig,
) -> bool {
    recognition_confidence < config.min_recognition_confidence
        && completeness(found_fields) < config.min_found_fraction
}
