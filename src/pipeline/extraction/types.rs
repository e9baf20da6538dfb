use std::fmt;

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::ExtractionError;

/// Encrypted input as received from the transport layer.
/// Bytes and password are wiped when the request drops it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptedDocument {
    bytes: Vec<u8>,
    password: String,
}

impl EncryptedDocument {
    pub fn new(bytes: Vec<u8>, password: impl Into<String>) -> Self {
        Self {
            bytes,
            password: password.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for EncryptedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedDocument")
            .field("len", &self.bytes.len())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A document whose password has been accepted and whose every page is reachable.
///
/// PDFium documents are `!Send`, so the unlocked document is carried as the
/// source bytes plus the accepted password; each page task reopens it.
/// Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DecryptedDocument {
    bytes: Vec<u8>,
    password: String,
    page_count: usize,
}

impl DecryptedDocument {
    pub fn new(bytes: Vec<u8>, password: String, page_count: usize) -> Self {
        Self {
            bytes,
            password,
            page_count,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Accepted password, `None` when the document was not encrypted.
    pub fn password(&self) -> Option<&str> {
        if self.password.is_empty() {
            None
        } else {
            Some(&self.password)
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

impl fmt::Debug for DecryptedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedDocument")
            .field("len", &self.bytes.len())
            .field("page_count", &self.page_count)
            .finish()
    }
}

/// One rasterized page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based position in the source document.
    pub index: usize,
    pub dpi: u32,
    pub image: DynamicImage,
}

/// Output of the preprocessing chain, 1:1 with its `PageImage`.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    pub index: usize,
    pub image: GrayImage,
}

/// Recognized text for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub page_index: usize,
    pub text: String,
    /// Mean token confidence, 0-100.
    pub confidence: f32,
    pub words: Vec<OcrWordResult>,
}

impl RecognitionResult {
    /// A page that produced nothing (blank, or the engine failed on it).
    pub fn empty(page_index: usize) -> Self {
        Self {
            page_index,
            text: String::new(),
            confidence: 0.0,
            words: vec![],
        }
    }
}

/// Single word with its confidence and position, from Tesseract TSV output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrWordResult {
    pub text: String,
    /// 0-100.
    pub confidence: f32,
    pub bounding_box: Option<BoundingBox>,
}

/// Bounding box for a recognized word, in page pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Non-fatal observations carried on a successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    EmptyPage { page: usize },
    LowConfidencePage { page: usize, confidence: f32 },
    RecognitionFailed { page: usize, reason: String },
    /// `value` is always masked.
    InvalidIdNumber { field: String, value: String },
}

/// Opens an encrypted document. Either every page is accessible or the call fails.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, document: &EncryptedDocument) -> Result<DecryptedDocument, ExtractionError>;
}

/// Renders a single page of an unlocked document at the fixed OCR resolution.
pub trait PageRasterizer: Send + Sync {
    fn render_page(
        &self,
        document: &DecryptedDocument,
        index: usize,
    ) -> Result<PageImage, ExtractionError>;

    /// Every page in document order. Stops at the first page that fails.
    fn render_all(&self, document: &DecryptedDocument) -> Result<Vec<PageImage>, ExtractionError> {
        (0..document.page_count())
            .map(|index| self.render_page(document, index))
            .collect()
    }
}

/// OCR engine abstraction (allows mocking for tests).
///
/// Engine failures are plain strings: the orchestrator decides how a failed
/// page affects the request.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &PreprocessedImage) -> Result<RecognitionResult, String>;
}
