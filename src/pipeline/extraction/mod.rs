pub mod types;
pub mod confidence;
pub mod sanitize;
pub mod preprocess;
pub mod pdfium;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use confidence::*;
pub use sanitize::*;
pub use preprocess::*;
pub use pdfium::*;
pub use ocr::*;
pub use orchestrator::*;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Pipeline stage bounded by a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decryption,
    Rasterization,
    Recognition,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Decryption => "decryption",
            Stage::Rasterization => "rasterization",
            Stage::Recognition => "recognition",
        })
    }
}

/// Per-request failure. A request ends in exactly one of these or a success.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid or missing password for the encrypted PDF")]
    WrongPassword,

    #[error("Invalid PDF document: {0}")]
    MalformedDocument(String),

    #[error("Failed to render page {page}: {reason}")]
    Rasterization { page: usize, reason: String },

    #[error("Text extraction failed due to poor image quality")]
    PoorImageQuality {
        recognition_confidence: f32,
        found_fields: usize,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{stage} timed out after {}s", .limit.as_secs_f32())]
    Timeout { stage: Stage, limit: Duration },
}

impl ExtractionError {
    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            ExtractionError::WrongPassword => "WRONG_PASSWORD",
            ExtractionError::MalformedDocument(_) => "MALFORMED_DOCUMENT",
            ExtractionError::Rasterization { .. } => "RASTERIZATION_ERROR",
            ExtractionError::PoorImageQuality { .. } => "POOR_IMAGE_QUALITY",
            ExtractionError::Validation(_) => "VALIDATION_ERROR",
            ExtractionError::Timeout { .. } => "TIMEOUT",
        }
    }
}

/// Construction-time failure: an engine the pipeline depends on is unusable.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("PDFium library not available: {0}")]
    PdfiumUnavailable(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    #[error("Tesseract language pack '{lang}' missing from {}", .dir.display())]
    MissingLanguage { lang: String, dir: PathBuf },

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),
}
