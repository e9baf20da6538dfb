// Structural checks on extracted identifiers.
// A value that fails is demoted to found=false with a masked warning; it never
// aborts the extraction.

use super::types::{FieldCandidates, FieldMatch, FieldName};
use crate::pipeline::extraction::{mask_id_number, ExtractionWarning};

/// Digits in the primary ID.
pub const ID_DIGITS: usize = 12;

/// Digits in the secondary (virtual) ID.
pub const SECONDARY_ID_DIGITS: usize = 16;

/// Validate identifier fields in place. Returns one warning per demoted field.
pub fn validate_fields(
    candidates: &mut FieldCandidates,
    verify_checksum: bool,
) -> Vec<ExtractionWarning> {
    let mut warnings = Vec::new();

    for (field, expected, checksum) in [
        (FieldName::IdNumber, ID_DIGITS, verify_checksum),
        (FieldName::SecondaryId, SECONDARY_ID_DIGITS, false),
    ] {
        let Some(value) = candidates.get(field).and_then(|m| m.text()).map(str::to_string) else {
            continue;
        };

        if is_structurally_valid(&value, expected) && (!checksum || verhoeff_valid(&value)) {
            continue;
        }

        let masked = mask_id_number(&value);
        tracing::warn!(field = %field, value = %masked, "Invalid ID number detected");
        warnings.push(ExtractionWarning::InvalidIdNumber {
            field: field.as_str().to_string(),
            value: masked,
        });
        candidates.fields.insert(field, FieldMatch::missing(field));
    }

    warnings
}

/// Exactly `digits` ASCII digits in groups of four separated by single spaces.
pub fn is_structurally_valid(value: &str, digits: usize) -> bool {
    let groups: Vec<&str> = value.split(' ').collect();
    groups.len() * 4 == digits
        && groups
            .iter()
            .all(|g| g.len() == 4 && g.bytes().all(|b| b.is_ascii_digit()))
}

// ── Verhoeff ──────────────────────────────────────────────

const VERHOEFF_D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

const VERHOEFF_P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

/// Verhoeff check over the digits of `value` (the last digit is the check digit).
pub fn verhoeff_valid(value: &str) -> bool {
    let digits: Vec<u8> = value
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect();
    if digits.is_empty() {
        return false;
    }
    let c = digits
        .iter()
        .rev()
        .enumerate()
        .fold(0u8, |c, (i, &d)| {
            VERHOEFF_D[c as usize][VERHOEFF_P[i % 8][d as usize] as usize]
        });
    c == 0
}
