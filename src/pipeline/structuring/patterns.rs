//! Field rules: an ordered list of matchers per field, tried in order, first
//! success wins.
//!
//! Regex matchers capture the value in a `value` group. A match whose
//! `overflow` group participates is rejected and the search continues after
//! it (e.g. the first twelve digits of a sixteen-digit number are not an ID).

use std::sync::LazyLock;

use regex::Regex;

use super::types::FieldName;

/// One way of locating a field's raw value in recognized text.
pub enum Matcher {
    /// Anchored to a printed label next to the value.
    Labeled(Regex),
    /// Context-free, scoped to the value's expected shape.
    Shape(Regex),
    /// Line-structure rule that a single regex cannot express.
    Heuristic(fn(&str) -> Option<String>),
}

impl Matcher {
    pub fn kind(&self) -> &'static str {
        match self {
            Matcher::Labeled(_) => "labeled",
            Matcher::Shape(_) => "shape",
            Matcher::Heuristic(_) => "heuristic",
        }
    }

    /// Raw candidates in text order. Heuristics yield at most one.
    pub fn candidates(&self, text: &str) -> Vec<String> {
        match self {
            Matcher::Labeled(re) | Matcher::Shape(re) => re
                .captures_iter(text)
                .filter(|caps| caps.name("overflow").is_none())
                .filter_map(|caps| caps.name("value").map(|m| m.as_str().to_string()))
                .collect(),
            Matcher::Heuristic(f) => f(text).into_iter().collect(),
        }
    }
}

/// Priority list of matchers for one field.
pub struct FieldRule {
    pub field: FieldName,
    pub matchers: Vec<Matcher>,
}

fn labeled(regex_str: &str) -> Matcher {
    Matcher::Labeled(Regex::new(regex_str).expect("Invalid field regex pattern"))
}

fn shape(regex_str: &str) -> Matcher {
    Matcher::Shape(Regex::new(regex_str).expect("Invalid field regex pattern"))
}

/// Card boilerplate that looks like a name line but never is one.
const BOILERPLATE: &[&str] = &[
    "government of india",
    "unique identification authority",
    "identification authority of india",
    "digitally signed by",
    "signature not verified",
    "enrolment no",
    "enrollment no",
    "your aadhaar no",
    "aadhaar",
    "mera aadhaar",
    "uidai",
    "download date",
    "issue date",
    "date of birth",
    "address",
    "male",
    "female",
];

/// States and union territories, for unlabeled state lines.
const STATES: &str = "Andhra Pradesh|Arunachal Pradesh|Assam|Bihar|Chhattisgarh|Goa|Gujarat|\
Haryana|Himachal Pradesh|Jharkhand|Karnataka|Kerala|Madhya Pradesh|Maharashtra|Manipur|\
Meghalaya|Mizoram|Nagaland|Odisha|Orissa|Punjab|Rajasthan|Sikkim|Tamil Nadu|Telangana|Tripura|\
Uttar Pradesh|Uttarakhand|West Bengal|Andaman and Nicobar Islands|Chandigarh|\
Dadra and Nagar Haveli and Daman and Diu|Delhi|Jammu and Kashmir|Ladakh|Lakshadweep|Puducherry";

static RELATION_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\b[SCDW]\s*/\s*O\b").expect("Invalid field regex pattern"));

static LATIN_NAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z .'\-]*(?:\s*[SCDWscdw]\s*/\s*[Oo]\b.*)?$")
        .expect("Invalid field regex pattern")
});

static ADDRESS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:address|முகவரி|पता)\s*[:\-]?\s*(.*)$").expect("Invalid field regex pattern")
});

static ADDRESS_STOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:district|dist\b|state\b|pin(?:\s*code)?\b|pincode|postal\s+code|vid\b|digitally|download|issue\s+date|aadhaar|mobile|phone|\d{6}\s*$|\d{4}\s\d{4}\s\d{4})",
    )
    .expect("Invalid field regex pattern")
});

static ADDRESS_GUARDIAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[SCDW]\s*/\s*O\b[.:]?\s*[A-Za-z .'\-]+,?").expect("Invalid field regex pattern")
});

static ADDRESS_EMBEDDED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}\s\d{4}\s\d{4}\b").expect("Invalid field regex pattern"));

static ADDRESS_PO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPO\s*:[^,]*,").expect("Invalid field regex pattern"));

static ADDRESS_TRAILING_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:dist|district|state)\b.*$").expect("Invalid field regex pattern")
});

/// Whether a line is in the regional (Tamil) script, ignoring spaces and punctuation.
fn is_regional_line(line: &str) -> bool {
    let mut letters = 0;
    for c in line.chars() {
        if ('\u{0B80}'..='\u{0BFF}').contains(&c) {
            letters += 1;
        } else if c.is_alphanumeric() {
            return false;
        }
    }
    letters > 0
}

static STATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^(?:{STATES})$")).expect("Invalid field regex pattern")
});

/// Word-level match so `male` does not hit `Kamalesh`.
fn is_boilerplate(line: &str) -> bool {
    let words: Vec<String> = line
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let padded = format!(" {} ", words.join(" "));
    BOILERPLATE.iter().any(|p| padded.contains(&format!(" {p} ")))
        || STATE_LINE.is_match(&words.join(" "))
}

/// Latin part of a candidate name line, cut at the relation marker.
fn name_part(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if !LATIN_NAME_LINE.is_match(trimmed) || is_boilerplate(trimmed) {
        return None;
    }
    let head = RELATION_SPLIT.split(trimmed).next().unwrap_or(trimmed).trim();
    (head.split_whitespace().count() > 1).then_some(head)
}

/// Regional-script line directly followed by the Latin name line.
pub fn regional_name_pair(text: &str) -> Option<(String, String)> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines.windows(2).find_map(|pair| {
        if !is_regional_line(pair[0]) {
            return None;
        }
        let latin = name_part(pair[1])?;
        Some((pair[0].to_string(), latin.to_string()))
    })
}

fn name_after_regional_line(text: &str) -> Option<String> {
    regional_name_pair(text).map(|(_, latin)| latin)
}

/// First Latin-only line of two or more words that is not card boilerplate.
fn first_name_like_line(text: &str) -> Option<String> {
    text.lines().find_map(name_part).map(str::to_string)
}

/// Address block: from the `Address` label up to the first district, state,
/// pincode, ID or signature line, then scrubbed of guardian phrase, embedded
/// IDs, post-office fragments and trailing region names.
pub fn address_block(text: &str) -> Option<String> {
    let mut lines = text.lines();
    let first = lines.by_ref().find_map(|l| {
        ADDRESS_LABEL
            .captures(l)
            .map(|caps| caps.get(1).map_or("", |m| m.as_str()).to_string())
    })?;

    let mut parts = vec![first];
    for line in lines {
        if ADDRESS_STOP.is_match(line) {
            break;
        }
        parts.push(line.to_string());
    }

    let cleaned: Vec<String> = parts
        .iter()
        .map(|part| {
            let s = ADDRESS_GUARDIAN.replace_all(part, "");
            let s = ADDRESS_EMBEDDED_ID.replace_all(&s, "");
            let s = ADDRESS_PO.replace_all(&s, "");
            ADDRESS_TRAILING_REGION.replace(&s, "").trim().to_string()
        })
        .filter(|s| !s.is_empty())
        .collect();

    let joined = cleaned.join(" ");
    let joined = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.trim_matches(|c: char| c == ',' || c.is_whitespace()).is_empty()).then_some(joined)
}

/// Ordered rules for all eleven fields.
pub static FIELD_RULES: LazyLock<Vec<FieldRule>> = LazyLock::new(|| {
    vec![
        FieldRule {
            field: FieldName::Name,
            matchers: vec![
                labeled(r"(?im)^\s*(?:name|பெயர்|नाम)\s*[:\-]\s*(?P<value>[A-Za-z][A-Za-z .'\-]*[A-Za-z])\s*$"),
                Matcher::Heuristic(name_after_regional_line),
                Matcher::Heuristic(first_name_like_line),
            ],
        },
        FieldRule {
            field: FieldName::GuardianName,
            matchers: vec![
                labeled(r"(?i)\b[SCDW]\s*/\s*O\b[.:,]?[ \t]*(?P<value>[A-Za-z][A-Za-z .'\-]*[A-Za-z])"),
                labeled(r"(?im)\b(?:father|husband|guardian)(?:'s)?[ \t]+name[ \t]*[:\-][ \t]*(?P<value>[A-Za-z][A-Za-z .'\-]*[A-Za-z])"),
            ],
        },
        FieldRule {
            field: FieldName::Dob,
            matchers: vec![
                labeled(r"(?i)(?:DOB|D\.O\.B\.?|Date\s+of\s+Birth|பிறந்த\s*நாள்|जन्म\s*तिथि)\s*[:\-]?\s*(?P<value>\d{1,2}\s*[-/.]\s*\d{1,2}\s*[-/.]\s*\d{4})"),
                labeled(r"(?i)(?:Year\s+of\s+Birth|YOB|பிறந்த\s*ஆண்டு|जन्म\s*वर्ष)\s*[:\-]?\s*(?P<value>(?:19|20)\d{2})\b"),
                shape(r"(?i)(?P<overflow>(?:issue|download|print)(?:\s+date)?\s*[:\-]?\s*)?\b(?P<value>\d{1,2}[-/.]\d{1,2}[-/.](?:19|20)\d{2})\b"),
            ],
        },
        FieldRule {
            field: FieldName::Gender,
            matchers: vec![
                labeled(r"(?i)(?:gender|sex|பாலினம்|लिंग)\s*[:/\-]?\s*(?P<value>transgender|female|male|திருநங்கை|பெண்|ஆண்|महिला|पुरुष|[MFT])\b"),
                shape(r"(?i)\b(?P<value>transgender|female|male|திருநங்கை|பெண்|ஆண்|महिला|पुरुष)\b"),
            ],
        },
        FieldRule {
            field: FieldName::IdNumber,
            matchers: vec![
                labeled(r"(?i)\b(?:your\s+)?(?:aadhaar|aadhar|uid)(?:[ \t]*(?:no\.?|number))?[ \t]*[:\-]?\s*(?P<value>\d(?:[ \t]?\d){7,15})\b"),
                shape(r"\b(?P<value>\d{4}[ \t]+\d{4}[ \t]+\d{4})\b(?P<overflow>[ \t]+\d{4}\b)?"),
            ],
        },
        FieldRule {
            field: FieldName::SecondaryId,
            matchers: vec![
                labeled(r"(?i)\bVID\s*[:\-]?\s*(?P<value>\d{4}[ \t]*\d{4}[ \t]*\d{4}[ \t]*\d{4})\b"),
                shape(r"\b(?P<value>\d{4}[ \t]+\d{4}[ \t]+\d{4}[ \t]+\d{4})\b"),
            ],
        },
        FieldRule {
            field: FieldName::Address,
            matchers: vec![Matcher::Heuristic(address_block)],
        },
        FieldRule {
            field: FieldName::District,
            matchers: vec![
                labeled(r"(?i)\bDist(?:rict)?\b\.?[ \t]*[:\-]?[ \t]*(?P<value>[A-Za-z][A-Za-z .\-]*[A-Za-z])"),
            ],
        },
        FieldRule {
            field: FieldName::State,
            matchers: vec![
                labeled(r"(?i)\bState\b[ \t]*[:\-]?[ \t]*(?P<value>[A-Za-z][A-Za-z .&\-]*[A-Za-z])"),
                shape(&format!(r"(?i)\b(?P<value>{STATES})\b")),
            ],
        },
        FieldRule {
            field: FieldName::Pincode,
            matchers: vec![
                labeled(r"(?i)\b(?:PIN(?:[ \t]*code)?|Pincode|Postal[ \t]+code)[ \t]*[:\-]?[ \t]*(?P<value>[1-9]\d{2}[ \t]?\d{3})\b"),
                shape(r"\b(?P<value>[1-9]\d{5})\b"),
            ],
        },
        FieldRule {
            field: FieldName::Phone,
            matchers: vec![
                labeled(r"(?i)\b(?:mobile|mob|phone|ph|contact)(?:[ \t]*no\.?)?[ \t]*[:\-]?[ \t]*(?:\+?91[ \t\-]?)?(?P<value>[6-9]\d{4}[ \t]?\d{5})\b"),
                shape(r"\b(?P<value>[6-9]\d{9})\b"),
            ],
        },
    ]
});
