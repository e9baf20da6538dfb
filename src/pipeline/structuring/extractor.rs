use tracing::debug;

use super::normalize::normalize_field;
use super::patterns::{regional_name_pair, FieldRule, FIELD_RULES};
use super::types::{FieldCandidates, FieldMatch};
use crate::pipeline::extraction::mask_id_number;

/// Run every field rule over the concatenated page text.
///
/// Fields are independent: each rule sees the full text and nothing else,
/// so a missing field never affects another.
pub fn extract_fields(text: &str) -> FieldCandidates {
    let fields = FIELD_RULES
        .iter()
        .map(|rule| (rule.field, extract_field(rule, text)))
        .collect();

    FieldCandidates {
        fields,
        regional_name: regional_name_pair(text).map(|(regional, _)| regional),
    }
}

/// The first candidate of the first matcher that finds one decides the field.
/// If that candidate does not normalize the field is missing; later
/// candidates and matchers are never consulted.
fn extract_field(rule: &FieldRule, text: &str) -> FieldMatch {
    let Some((matcher, raw)) = rule
        .matchers
        .iter()
        .find_map(|m| m.candidates(text).into_iter().next().map(|raw| (m, raw)))
    else {
        return FieldMatch::missing(rule.field);
    };

    match normalize_field(rule.field, &raw) {
        Some(value) => {
            if rule.field.is_id() {
                debug!(
                    field = %rule.field,
                    via = matcher.kind(),
                    value = %mask_id_number(&value.to_string()),
                    "Field matched"
                );
            } else {
                debug!(field = %rule.field, via = matcher.kind(), "Field matched");
            }
            FieldMatch::found(rule.field, value)
        }
        None => {
            debug!(
                field = %rule.field,
                via = matcher.kind(),
                "Matched value rejected by normalization"
            );
            FieldMatch::missing(rule.field)
        }
    }
}
