/// Sanitize recognized page text before concatenation.
/// Strips control characters and replacement glyphs, trims lines, drops empty lines.
/// Script-agnostic: Tamil vowel signs and virama must survive.
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            (!c.is_control() || matches!(c, '\n' | '\t'))
                && !matches!(
                    c,
                    '\u{FFFD}' // Replacement character
                        | '\u{FEFF}' // BOM
                        | '\u{00AD}' // Soft hyphen
                )
        })
        .collect::<String>()
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Mask an ID number for logs: every digit except the last four becomes `X`.
/// Separators are kept so the grouping stays readable.
pub fn mask_id_number(value: &str) -> String {
    let total_digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let keep_from = total_digits.saturating_sub(4);

    let mut seen = 0usize;
    value
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                seen += 1;
                if seen > keep_from {
                    c
                } else {
                    'X'
                }
            } else {
                c
            }
        })
        .collect()
}
