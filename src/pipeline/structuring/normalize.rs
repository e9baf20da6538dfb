//! Post-match normalization. Every function here is idempotent: feeding a
//! normalized value back in returns it unchanged.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{BirthDate, FieldName, FieldValue};

static RELATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\b[SCDW]\s*/\s*O\b.*$").expect("valid relation regex")
});

static TRAILING_INITIALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s+[CWSDcwsd])+\s*$").expect("valid initials regex"));

static DATE_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\s*[-/.]\s*(\d{1,2})\s*[-/.]\s*(\d{4})$").expect("valid date regex")
});

static YEAR_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})$").expect("valid year regex"));

/// Plausible birth years.
const MIN_YEAR: u16 = 1900;
const MAX_YEAR: u16 = 2100;

/// Normalize a raw match for `field`. `None` means the match is not a usable value.
pub fn normalize_field(field: FieldName, raw: &str) -> Option<FieldValue> {
    let text = match field {
        FieldName::Name | FieldName::GuardianName => normalize_name(raw),
        FieldName::Gender => normalize_gender(raw),
        FieldName::Dob => return normalize_dob(raw).map(FieldValue::Date),
        FieldName::IdNumber | FieldName::SecondaryId => normalize_id_digits(raw),
        FieldName::Pincode | FieldName::Phone => digits_only(raw),
        FieldName::Address | FieldName::District | FieldName::State => normalize_place(raw),
    }?;
    Some(FieldValue::Text(text))
}

/// Collapse runs of whitespace to one space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Person name: cut at a relation marker (S/O, C/O, D/O, W/O), drop dangling
/// initials left by the cut, title-case Latin letters.
pub fn normalize_name(raw: &str) -> Option<String> {
    let collapsed = collapse_whitespace(raw);
    let cut = RELATION_MARKER.replace(&collapsed, "");
    let cut = TRAILING_INITIALS.replace(&cut, "");
    let cleaned = cut.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | ':' | '-'));
    if cleaned.is_empty() {
        return None;
    }
    Some(title_case(cleaned))
}

/// Uppercase the first letter of each word, lowercase the rest.
/// Scripts without case pass through.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Gender in English, single-letter code, Tamil or Hindi, to a canonical English word.
pub fn normalize_gender(raw: &str) -> Option<String> {
    let lower = raw.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "male" | "m" | "ஆண்" | "पुरुष" => "Male",
        "female" | "f" | "பெண்" | "महिला" => "Female",
        "transgender" | "t" | "திருநங்கை" | "ट्रांसजेंडर" => "Transgender",
        _ => return None,
    };
    Some(canonical.to_string())
}

/// Day/month/year with `-`, `/` or `.` separators, or a bare year of birth.
pub fn normalize_dob(raw: &str) -> Option<BirthDate> {
    let trimmed = raw.trim();

    if let Some(caps) = DATE_PARTS.captures(trimmed) {
        let day: u8 = caps[1].parse().ok()?;
        let month: u8 = caps[2].parse().ok()?;
        let year: u16 = caps[3].parse().ok()?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&year)
            || !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(month, year)
        {
            return None;
        }
        return Some(BirthDate {
            day: Some(day),
            month: Some(month),
            year,
        });
    }

    let caps = YEAR_ONLY.captures(trimmed)?;
    let year: u16 = caps[1].parse().ok()?;
    (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(BirthDate {
        day: None,
        month: None,
        year,
    })
}

fn days_in_month(month: u8, year: u16) -> u8 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Strip separators and regroup in blocks of four: `2345 6789 0123`.
/// Length is not checked here; structural validation happens later.
pub fn normalize_id_digits(raw: &str) -> Option<String> {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(
        digits
            .chunks(4)
            .map(|chunk| chunk.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

pub fn digits_only(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

/// Address, district, state: collapse whitespace, drop stray edge punctuation.
pub fn normalize_place(raw: &str) -> Option<String> {
    let collapsed = collapse_whitespace(raw);
    let trimmed = collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | ':' | ';' | '-'));
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_idempotent(field: FieldName, raw: &str) {
        let once = normalize_field(field, raw).unwrap_or_else(|| panic!("{field}: {raw:?}"));
        let twice = normalize_field(field, &once.to_string())
            .unwrap_or_else(|| panic!("{field}: re-normalize {once}"));
        assert_eq!(once, twice, "{field} not idempotent for {raw:?}");
    }

    #[test]
    fn normalization_is_idempotent() {
        let cases = [
            (FieldName::Name, "RAVI   KUMAR S/O Mohan"),
            (FieldName::Name, "priya d'souza"),
            (FieldName::Name, "Arun C D"),
            (FieldName::GuardianName, "mohan   kumar,"),
            (FieldName::Dob, "05-08-1990"),
            (FieldName::Dob, "5.8.1990"),
            (FieldName::Dob, "05/08/1990"),
            (FieldName::Dob, "1987"),
            (FieldName::Gender, "MALE"),
            (FieldName::Gender, "பெண்"),
            (FieldName::Gender, "t"),
            (FieldName::IdNumber, "2345  6789 0123"),
            (FieldName::IdNumber, "234567890123"),
            (FieldName::SecondaryId, "9123-4567-8901-2345"),
            (FieldName::Pincode, "600 001"),
            (FieldName::Phone, "98765 43210"),
            (FieldName::Address, "  12, Gandhi Street,\n Anna Nagar, "),
            (FieldName::District, "Chennai,"),
            (FieldName::State, "Tamil   Nadu"),
        ];
        for (field, raw) in cases {
            assert_idempotent(field, raw);
        }
    }

    #[test]
    fn name_cut_at_relation_marker() {
        assert_eq!(
            normalize_name("RAVI KUMAR S/O Mohan Kumar").as_deref(),
            Some("Ravi Kumar")
        );
        assert_eq!(normalize_name("Lakshmi W/o Suresh").as_deref(), Some("Lakshmi"));
    }

    #[test]
    fn name_drops_dangling_initials() {
        assert_eq!(normalize_name("Arun Prakash S").as_deref(), Some("Arun Prakash"));
        assert_eq!(normalize_name("Arun C D").as_deref(), Some("Arun"));
    }

    #[test]
    fn name_title_case_handles_apostrophes() {
        assert_eq!(normalize_name("PRIYA D'SOUZA").as_deref(), Some("Priya D'Souza"));
    }

    #[test]
    fn empty_name_is_none() {
        assert!(normalize_name("  S/O Mohan").is_none());
    }

    #[test]
    fn gender_variants() {
        assert_eq!(normalize_gender("FEMALE").as_deref(), Some("Female"));
        assert_eq!(normalize_gender("M").as_deref(), Some("Male"));
        assert_eq!(normalize_gender("ஆண்").as_deref(), Some("Male"));
        assert_eq!(normalize_gender("महिला").as_deref(), Some("Female"));
        assert!(normalize_gender("unknown").is_none());
    }

    #[test]
    fn dob_separators_normalized() {
        let expected = BirthDate {
            day: Some(15),
            month: Some(8),
            year: 1990,
        };
        for raw in ["15/08/1990", "15-08-1990", "15.08.1990", "15/8/1990"] {
            assert_eq!(normalize_dob(raw), Some(expected), "{raw}");
        }
    }

    #[test]
    fn dob_rejects_impossible_dates() {
        assert!(normalize_dob("31/02/1990").is_none());
        assert!(normalize_dob("00/01/1990").is_none());
        assert!(normalize_dob("12/13/1990").is_none());
        assert!(normalize_dob("01/01/1800").is_none());
    }

    #[test]
    fn dob_leap_day() {
        assert!(normalize_dob("29/02/2000").is_some());
        assert!(normalize_dob("29/02/1900").is_none());
    }

    #[test]
    fn dob_year_only() {
        let d = normalize_dob("1987").unwrap();
        assert_eq!((d.day, d.month, d.year), (None, None, 1987));
    }

    #[test]
    fn id_digits_regrouped() {
        assert_eq!(
            normalize_id_digits("2345-6789-0123").as_deref(),
            Some("2345 6789 0123")
        );
        assert_eq!(normalize_id_digits("1234567890").as_deref(), Some("1234 5678 90"));
        assert!(normalize_id_digits("abc").is_none());
    }

    #[test]
    fn place_trims_punctuation() {
        assert_eq!(normalize_place(" Chennai, ").as_deref(), Some("Chennai"));
        assert!(normalize_place(" ,. ").is_none());
    }
}
