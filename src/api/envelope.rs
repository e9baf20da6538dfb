//! Transport envelopes: one JSON shape for success, one for failure.

use serde::Serialize;

use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::structuring::ExtractionResult;

/// Response body handed to the transport layer.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Envelope {
    Success {
        data: ExtractionResult,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

impl Envelope {
    pub fn from_outcome(outcome: Result<ExtractionResult, ExtractionError>) -> Self {
        match outcome {
            Ok(data) => Envelope::Success { data },
            Err(err) => Envelope::from(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }
}

impl From<ExtractionError> for Envelope {
    fn from(err: ExtractionError) -> Self {
        Envelope::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
