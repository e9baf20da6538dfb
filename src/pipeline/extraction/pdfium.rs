//! PDF decryption and page rendering via Google PDFium.
//!
//! `PdfiumBackend` is stateless (`Send + Sync`). Each operation creates a
//! fresh `Pdfium` instance because the upstream type is `!Send`. The OS caches
//! `dlopen`/`LoadLibrary` calls, so repeat loads are near-free, and the
//! `thread_safe` feature serializes concurrent page renders inside PDFium.

use image::{DynamicImage, Rgb, RgbImage};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::{DecryptedDocument, Decryptor, EncryptedDocument, PageImage, PageRasterizer};
use super::{EngineError, ExtractionError};
use crate::config;

/// Fixed rasterization resolution. 300 DPI is the Tesseract sweet spot for
/// card-sized print; higher adds cost without accuracy.
pub const RENDER_DPI: u32 = 300;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on absurd page boxes.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// How far into the stream the `%PDF-` marker may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Decrypts and renders PDFs using Google PDFium.
pub struct PdfiumBackend;

impl PdfiumBackend {
    /// Create a new backend, verifying the PDFium library is loadable.
    pub fn new() -> Result<Self, EngineError> {
        // Fail fast at construction rather than on the first request.
        load_pdfium().map_err(EngineError::PdfiumUnavailable)?;
        Ok(Self)
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path)
/// 2. Alongside the running executable
/// 3. System library search paths
fn load_pdfium() -> Result<Pdfium, String> {
    if let Ok(path) = std::env::var(config::PDFIUM_LIB_ENV) {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| format!("Failed to load PDFium from {path}: {e}"))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidates = [exe_dir.to_path_buf(), exe_dir.join("lib")];
            for dir in &candidates {
                let lib_path =
                    Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        format!("PDFium library not found. Set {} or install PDFium: {e}", config::PDFIUM_LIB_ENV)
    })?;
    Ok(Pdfium::new(bindings))
}

/// Reject input that cannot be a PDF before any engine is involved.
pub fn check_pdf_header(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::MalformedDocument(
            "Empty PDF stream provided".into(),
        ));
    }
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if !window.windows(5).any(|w| w == b"%PDF-") {
        return Err(ExtractionError::MalformedDocument(
            "Missing %PDF- header".into(),
        ));
    }
    Ok(())
}

/// Map PDFium load errors. Only PDFium's own password status counts as a
/// wrong password; everything else is a parse failure.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    match e {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            ExtractionError::WrongPassword
        }
        other => ExtractionError::MalformedDocument(other.to_string()),
    }
}

/// The library failed to bind, so the document was never inspected.
fn engine_unavailable(reason: String) -> ExtractionError {
    tracing::error!(error = %reason, "PDF engine unavailable during decryption");
    ExtractionError::MalformedDocument(format!("PDF engine unavailable: {reason}"))
}

/// Compute pixel dimensions for rendering, applying the dimension guard.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl Decryptor for PdfiumBackend {
    fn decrypt(&self, document: &EncryptedDocument) -> Result<DecryptedDocument, ExtractionError> {
        check_pdf_header(document.bytes())?;

        let pdfium = load_pdfium().map_err(engine_unavailable)?;
        let password = Some(document.password()).filter(|p| !p.is_empty());
        let pdf = pdfium
            .load_pdf_from_byte_slice(document.bytes(), password)
            .map_err(map_load_error)?;

        let pages = pdf.pages();
        let page_count = pages.len() as usize;
        if page_count == 0 {
            return Err(ExtractionError::MalformedDocument(
                "Document has no pages".into(),
            ));
        }

        // All-or-nothing: every page object must be reachable before we hand
        // the document downstream.
        for index in 0..pages.len() {
            pages.get(index).map_err(|e| {
                ExtractionError::MalformedDocument(format!(
                    "Page {} unreadable after decryption: {e}",
                    index as usize + 1
                ))
            })?;
        }

        debug!(pages = page_count, "PDF unlocked");

        Ok(DecryptedDocument::new(
            document.bytes().to_vec(),
            document.password().to_string(),
            page_count,
        ))
    }
}

impl PageRasterizer for PdfiumBackend {
    fn render_page(
        &self,
        document: &DecryptedDocument,
        index: usize,
    ) -> Result<PageImage, ExtractionError> {
        let page_number = index + 1;
        let render_err = |reason: String| ExtractionError::Rasterization {
            page: page_number,
            reason,
        };

        let pdfium = load_pdfium().map_err(render_err)?;
        let pdf = pdfium
            .load_pdf_from_byte_slice(document.bytes(), document.password())
            .map_err(|e| render_err(format!("Failed to reopen document: {e}")))?;

        let pages = pdf.pages();
        let page_index = u16::try_from(index)
            .map_err(|_| render_err(format!("Page index {index} exceeds u16 maximum")))?;
        let page = pages.get(page_index).map_err(|_| {
            render_err(format!(
                "Page {page_number} out of range (document has {} pages)",
                pages.len()
            ))
        })?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, RENDER_DPI);

        let uncapped_w = (width_points * RENDER_DPI as f32 / POINTS_PER_INCH) as u32;
        let uncapped_h = (height_points * RENDER_DPI as f32 / POINTS_PER_INCH) as u32;
        if target_w != uncapped_w || target_h != uncapped_h {
            warn!(
                page = page_number,
                raw_width = uncapped_w,
                raw_height = uncapped_h,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| render_err(format!("Rendering failed: {e}")))?;

        let image = bitmap.as_image();

        debug!(
            page = page_number,
            width = target_w,
            height = target_h,
            "Rendered PDF page"
        );

        Ok(PageImage {
            index,
            dpi: RENDER_DPI,
            image,
        })
    }
}

// ── Mocks for testing ─────────────────────────────────────

/// Mock decryptor: accepts exactly one password and reports a fixed page count.
/// Still enforces the `%PDF-` header so malformed input behaves as in production.
pub struct MockDecryptor {
    password: String,
    page_count: usize,
}

impl MockDecryptor {
    pub fn new(password: &str, page_count: usize) -> Self {
        Self {
            password: password.to_string(),
            page_count,
        }
    }
}

impl Decryptor for MockDecryptor {
    fn decrypt(&self, document: &EncryptedDocument) -> Result<DecryptedDocument, ExtractionError> {
        check_pdf_header(document.bytes())?;
        if document.password() != self.password {
            return Err(ExtractionError::WrongPassword);
        }
        if self.page_count == 0 {
            return Err(ExtractionError::MalformedDocument(
                "Document has no pages".into(),
            ));
        }
        Ok(DecryptedDocument::new(
            document.bytes().to_vec(),
            document.password().to_string(),
            self.page_count,
        ))
    }
}

/// Mock rasterizer returning a small synthetic scan for each valid page.
pub struct MockPageRasterizer {
    fail_on: Option<usize>,
    delay: Option<std::time::Duration>,
}

impl MockPageRasterizer {
    pub fn new() -> Self {
        Self {
            fail_on: None,
            delay: None,
        }
    }

    /// Fail rendering of the page at `index` (0-based).
    pub fn failing_on(mut self, index: usize) -> Self {
        self.fail_on = Some(index);
        self
    }

    /// Block for `delay` before each render.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Default for MockPageRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRasterizer for MockPageRasterizer {
    fn render_page(
        &self,
        document: &DecryptedDocument,
        index: usize,
    ) -> Result<PageImage, ExtractionError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if index >= document.page_count() || self.fail_on == Some(index) {
            return Err(ExtractionError::Rasterization {
                page: index + 1,
                reason: "Corrupted page stream".into(),
            });
        }
        Ok(PageImage {
            index,
            dpi: RENDER_DPI,
            image: DynamicImage::ImageRgb8(synthetic_scan(64, 40)),
        })
    }
}

/// Light background with a dark text-like band, enough for the preprocess chain.
pub fn synthetic_scan(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let in_band = y > height / 3 && y < height / 2 && x % 6 < 4;
        if in_band {
            Rgb([30, 30, 40])
        } else {
            Rgb([235, 232, 225])
        }
    })
}
