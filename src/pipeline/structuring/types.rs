use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::extraction::ExtractionWarning;

/// The closed set of target fields on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Name,
    GuardianName,
    Dob,
    Gender,
    IdNumber,
    SecondaryId,
    Address,
    District,
    State,
    Pincode,
    Phone,
}

impl FieldName {
    pub const ALL: [FieldName; 11] = [
        FieldName::Name,
        FieldName::GuardianName,
        FieldName::Dob,
        FieldName::Gender,
        FieldName::IdNumber,
        FieldName::SecondaryId,
        FieldName::Address,
        FieldName::District,
        FieldName::State,
        FieldName::Pincode,
        FieldName::Phone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Name => "name",
            FieldName::GuardianName => "guardian_name",
            FieldName::Dob => "dob",
            FieldName::Gender => "gender",
            FieldName::IdNumber => "id_number",
            FieldName::SecondaryId => "secondary_id",
            FieldName::Address => "address",
            FieldName::District => "district",
            FieldName::State => "state",
            FieldName::Pincode => "pincode",
            FieldName::Phone => "phone",
        }
    }

    /// Numeric identifiers that are masked in logs and warnings.
    pub fn is_id(&self) -> bool {
        matches!(self, FieldName::IdNumber | FieldName::SecondaryId)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date of birth. Cards printed with only a year of birth leave day and month empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthDate {
    pub day: Option<u8>,
    pub month: Option<u8>,
    pub year: u16,
}

impl fmt::Display for BirthDate {
    /// Canonical form: `DD/MM/YYYY`, or `YYYY` for year-only dates.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.day, self.month) {
            (Some(d), Some(m)) => write!(f, "{d:02}/{m:02}/{:04}", self.year),
            _ => write!(f, "{:04}", self.year),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Date(BirthDate),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Date(d) => d.fmt(f),
        }
    }
}

/// One field of the result. `found == false` always carries `value == None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub field: FieldName,
    pub value: Option<FieldValue>,
    pub found: bool,
}

impl FieldMatch {
    pub fn found(field: FieldName, value: FieldValue) -> Self {
        Self {
            field,
            value: Some(value),
            found: true,
        }
    }

    pub fn missing(field: FieldName) -> Self {
        Self {
            field,
            value: None,
            found: false,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }
}

/// Raw output of the field extractor, before validation and scoring.
#[derive(Debug, Clone)]
pub struct FieldCandidates {
    pub fields: BTreeMap<FieldName, FieldMatch>,
    /// Regional-script rendering of the name, when printed above the Latin one.
    pub regional_name: Option<String>,
}

impl FieldCandidates {
    pub fn get(&self, field: FieldName) -> Option<&FieldMatch> {
        self.fields.get(&field)
    }

    pub fn is_found(&self, field: FieldName) -> bool {
        self.get(field).is_some_and(|m| m.found)
    }

    pub fn found_count(&self) -> usize {
        self.fields.values().filter(|m| m.found).count()
    }
}

/// Final, immutable result of one extraction request.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    fields: BTreeMap<FieldName, FieldMatch>,
    confidence_score: f32,
    recognition_confidence: f32,
    page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    regional_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<ExtractionWarning>,
}

impl ExtractionResult {
    pub(crate) fn assemble(
        candidates: FieldCandidates,
        confidence_score: f32,
        recognition_confidence: f32,
        page_count: usize,
        warnings: Vec<ExtractionWarning>,
    ) -> Self {
        Self {
            fields: candidates.fields,
            confidence_score,
            recognition_confidence,
            page_count,
            regional_name: candidates.regional_name,
            warnings,
        }
    }

    pub fn fields(&self) -> &BTreeMap<FieldName, FieldMatch> {
        &self.fields
    }

    pub fn field(&self, name: FieldName) -> Option<&FieldMatch> {
        self.fields.get(&name)
    }

    /// Normalized value rendered as a string, `None` when not found.
    pub fn value(&self, name: FieldName) -> Option<String> {
        self.field(name)
            .filter(|m| m.found)
            .and_then(|m| m.value.as_ref())
            .map(|v| v.to_string())
    }

    pub fn is_found(&self, name: FieldName) -> bool {
        self.field(name).is_some_and(|m| m.found)
    }

    pub fn found_count(&self) -> usize {
        self.fields.values().filter(|m| m.found).count()
    }

    /// Combined score, 0-100.
    pub fn confidence_score(&self) -> f32 {
        self.confidence_score
    }

    /// Mean recognition confidence over all pages, 0-100.
    pub fn recognition_confidence(&self) -> f32 {
        self.recognition_confidence
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn regional_name(&self) -> Option<&str> {
        self.regional_name.as_deref()
    }

    pub fn warnings(&self) -> &[ExtractionWarning] {
        &self.warnings
    }
}
