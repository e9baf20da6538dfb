use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::try_join_all;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::confidence::{analyze_page, document_confidence};
use super::pdfium::check_pdf_header;
use super::preprocess::{Bt601Grayscale, GrayscaleConverter, ImagePreprocessor};
use super::sanitize::sanitize_extracted_text;
use super::types::{
    Decryptor, DecryptedDocument, EncryptedDocument, ExtractionWarning, OcrEngine,
    PageRasterizer, PreprocessedImage, RecognitionResult,
};
use super::{ExtractionError, Stage};
use crate::pipeline::structuring::{
    compute_confidence_score, extract_fields, is_poor_quality, validate_fields, ExtractionResult,
};
use crate::pipeline_config::PipelineConfig;

/// End-to-end extractor: decrypt, rasterize, preprocess, recognize, structure.
///
/// Holds no per-request state, so one instance serves concurrent requests.
/// Every engine sits behind a trait object, which lets tests swap in mocks.
pub struct IdentityExtractor {
    decryptor: Arc<dyn Decryptor>,
    rasterizer: Arc<dyn PageRasterizer>,
    preprocessor: Arc<dyn ImagePreprocessor>,
    ocr_engine: Arc<dyn OcrEngine>,
    config: PipelineConfig,
}

impl IdentityExtractor {
    pub fn new(
        decryptor: Arc<dyn Decryptor>,
        rasterizer: Arc<dyn PageRasterizer>,
        preprocessor: Arc<dyn ImagePreprocessor>,
        ocr_engine: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            decryptor,
            rasterizer,
            preprocessor,
            ocr_engine,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Production wiring: PDFium for decryption and rendering, the standard
    /// preprocess chain, Tesseract for recognition.
    #[cfg(feature = "ocr")]
    pub fn from_engines(
        tessdata_dir: &std::path::Path,
        config: PipelineConfig,
    ) -> Result<Self, super::EngineError> {
        let pdfium = Arc::new(super::pdfium::PdfiumBackend::new()?);
        let ocr = Arc::new(super::ocr::BundledTesseract::new(tessdata_dir)?);
        Ok(Self::new(
            pdfium.clone(),
            pdfium,
            Arc::new(super::preprocess::PreprocessChain::standard()),
            ocr,
        )
        .with_config(config))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline on one document.
    ///
    /// Ends in exactly one outcome. Dropping the returned future abandons the
    /// request; blocking engine work already started finishes in the background
    /// and its result is discarded.
    pub async fn extract(
        &self,
        document: EncryptedDocument,
    ) -> Result<ExtractionResult, ExtractionError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        let size = document.bytes().len();
        if size > self.config.max_document_bytes {
            return Err(ExtractionError::Validation(format!(
                "Document is {size} bytes, limit is {}",
                self.config.max_document_bytes
            )));
        }
        check_pdf_header(document.bytes())?;

        tracing::info!(
            request_id = %request_id,
            size,
            sha256 = %fingerprint(document.bytes()),
            "Starting identity extraction"
        );

        // Step 1: Decrypt. The encrypted copy (and its password) is zeroed
        // when the blocking task drops it.
        let decryptor = Arc::clone(&self.decryptor);
        let decrypted = run_blocking(
            Stage::Decryption,
            self.config.decrypt_timeout,
            move || decryptor.decrypt(&document),
            |reason| {
                Err(ExtractionError::MalformedDocument(format!(
                    "Decryption aborted: {reason}"
                )))
            },
        )
        .await?;
        let page_count = decrypted.page_count();
        tracing::debug!(request_id = %request_id, page_count, "Document unlocked");

        // Step 2: Per-page rasterize, preprocess, recognize. Bounded fan-out,
        // results come back in page order.
        let decrypted = Arc::new(decrypted);
        let semaphore = Semaphore::new(self.config.max_parallel_pages.max(1));
        let pages = try_join_all(
            (0..page_count).map(|index| self.process_page(&decrypted, index, &semaphore)),
        )
        .await?;

        // Step 3: Sanitize, collect page warnings, concatenate.
        let mut warnings = Vec::new();
        let mut results: Vec<RecognitionResult> = Vec::with_capacity(page_count);
        for (mut result, failure) in pages {
            result.text = sanitize_extracted_text(&result.text);
            match failure {
                Some(warning) => warnings.push(warning),
                None => warnings.extend(analyze_page(&result, self.config.low_page_confidence)),
            }
            results.push(result);
        }

        let text = results
            .iter()
            .map(|r| r.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let recognition_confidence = document_confidence(&results);

        // Step 4: Fields, identifier validation, scoring.
        let mut candidates = extract_fields(&text);
        warnings.extend(validate_fields(
            &mut candidates,
            self.config.verify_id_checksum,
        ));
        let found_fields = candidates.found_count();

        if is_poor_quality(recognition_confidence, found_fields, &self.config) {
            tracing::warn!(
                request_id = %request_id,
                recognition_confidence,
                found_fields,
                "Scan unreadable"
            );
            return Err(ExtractionError::PoorImageQuality {
                recognition_confidence,
                found_fields,
            });
        }

        let confidence_score =
            compute_confidence_score(recognition_confidence, found_fields, &self.config);

        tracing::info!(
            request_id = %request_id,
            page_count,
            found_fields,
            recognition_confidence,
            confidence_score,
            warnings = warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Identity extraction complete"
        );

        Ok(ExtractionResult::assemble(
            candidates,
            confidence_score,
            recognition_confidence,
            page_count,
            warnings,
        ))
    }

    /// One page through rasterize, preprocess, recognize. A recognition
    /// failure degrades to an empty page plus a warning; a rendering failure
    /// fails the request.
    async fn process_page(
        &self,
        document: &Arc<DecryptedDocument>,
        index: usize,
        semaphore: &Semaphore,
    ) -> Result<(RecognitionResult, Option<ExtractionWarning>), ExtractionError> {
        let page = index + 1;
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| ExtractionError::Rasterization {
                page,
                reason: e.to_string(),
            })?;

        let rasterizer = Arc::clone(&self.rasterizer);
        let doc = Arc::clone(document);
        let image = run_blocking(
            Stage::Rasterization,
            self.config.rasterize_timeout,
            move || rasterizer.render_page(&doc, index),
            |reason| Err(ExtractionError::Rasterization { page, reason }),
        )
        .await?;

        // Preprocessing never fails the request: if the chain dies, the page
        // goes to recognition as plain luminance.
        let image = Arc::new(image);
        let preprocessor = Arc::clone(&self.preprocessor);
        let source = Arc::clone(&image);
        let prepared = match tokio::task::spawn_blocking(move || preprocessor.preprocess(&source))
            .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!(page, error = %e, "Preprocessing aborted, using unprocessed page");
                PreprocessedImage {
                    index,
                    image: Bt601Grayscale.to_gray(&image.image),
                }
            }
        };

        let ocr = Arc::clone(&self.ocr_engine);
        let recognized = run_blocking(
            Stage::Recognition,
            self.config.recognize_timeout,
            move || Ok(ocr.recognize(&prepared)),
            |reason| Ok(Err(format!("Recognition aborted: {reason}"))),
        )
        .await?;

        Ok(match recognized {
            Ok(result) => {
                tracing::debug!(
                    page,
                    confidence = result.confidence,
                    words = result.words.len(),
                    "Page recognized"
                );
                (result, None)
            }
            Err(reason) => {
                tracing::warn!(page, reason = %reason, "Recognition failed, page treated as empty");
                (
                    RecognitionResult::empty(index),
                    Some(ExtractionWarning::RecognitionFailed { page, reason }),
                )
            }
        })
    }
}

/// Run blocking engine work under a deadline. On timeout the task is
/// detached, not killed. `on_abort` decides what a panicked task means
/// for its stage.
async fn run_blocking<T, F>(
    stage: Stage,
    limit: Duration,
    work: F,
    on_abort: impl FnOnce(String) -> Result<T, ExtractionError>,
) -> Result<T, ExtractionError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ExtractionError> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
        Err(_) => {
            tracing::warn!(%stage, limit_ms = limit.as_millis() as u64, "Stage timed out");
            Err(ExtractionError::Timeout { stage, limit })
        }
        Ok(Err(join_error)) => on_abort(join_error.to_string()),
        Ok(Ok(result)) => result,
    }
}

/// Short content fingerprint for correlating logs without logging the document.
fn fingerprint(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::{
        MockDecryptor, MockOcrEngine, MockPageRasterizer, PageImage, PreprocessChain,
    };
    use crate::pipeline::structuring::FieldName;

    const PASSWORD: &str = "RAVI1990";

    const FRONT: &str = "\
Government of India
ரவி குமார்
Ravi Kumar
DOB: 15/08/1990
MALE
2345 6789 0123
VID : 9123 4567 8901 2345";

    const BACK: &str = "\
Address: S/O Mohan Kumar, 12, Gandhi Street,
Anna Nagar, Chennai
District: Chennai
State: Tamil Nadu
PIN Code: 600040
Mobile: 9876543210";

    fn pdf() -> Vec<u8> {
        b"%PDF-1.7\n% synthetic e-letter\n".to_vec()
    }

    fn extractor(
        page_count: usize,
        rasterizer: MockPageRasterizer,
        ocr: MockOcrEngine,
    ) -> IdentityExtractor {
        IdentityExtractor::new(
            Arc::new(MockDecryptor::new(PASSWORD, page_count)),
            Arc::new(rasterizer),
            Arc::new(PreprocessChain::standard()),
            Arc::new(ocr),
        )
    }

    fn request() -> EncryptedDocument {
        EncryptedDocument::new(pdf(), PASSWORD)
    }

    #[tokio::test]
    async fn two_page_letter_extracts_every_field() {
        let ex = extractor(
            2,
            MockPageRasterizer::new(),
            MockOcrEngine::with_pages(&[(FRONT, 92.0), (BACK, 88.0)]),
        );
        let result = ex.extract(request()).await.unwrap();

        assert_eq!(result.page_count(), 2);
        assert_eq!(result.found_count(), 11);
        assert_eq!(result.value(FieldName::Name).as_deref(), Some("Ravi Kumar"));
        assert_eq!(result.value(FieldName::Pincode).as_deref(), Some("600040"));
        assert_eq!(result.regional_name(), Some("ரவி குமார்"));
        assert!((result.recognition_confidence() - 90.0).abs() < 0.01);
        assert!(result.confidence_score() > 90.0);
        assert!(result.warnings().is_empty(), "{:?}", result.warnings());
    }

    #[tokio::test]
    async fn page_count_matches_document() {
        let text = format!("{FRONT}\n{BACK}");
        let ex = extractor(
            4,
            MockPageRasterizer::new(),
            MockOcrEngine::new(&text, 80.0),
        );
        let result = ex.extract(request()).await.unwrap();
        assert_eq!(result.page_count(), 4);
    }

    #[tokio::test]
    async fn wrong_password_rejected() {
        let ex = extractor(1, MockPageRasterizer::new(), MockOcrEngine::new(FRONT, 90.0));
        let err = ex
            .extract(EncryptedDocument::new(pdf(), "WRONG1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::WrongPassword));
    }

    #[tokio::test]
    async fn empty_password_rejected() {
        let ex = extractor(1, MockPageRasterizer::new(), MockOcrEngine::new(FRONT, 90.0));
        let err = ex
            .extract(EncryptedDocument::new(pdf(), ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::WrongPassword));
    }

    #[tokio::test]
    async fn non_pdf_is_malformed() {
        let ex = extractor(1, MockPageRasterizer::new(), MockOcrEngine::new(FRONT, 90.0));
        let err = ex
            .extract(EncryptedDocument::new(b"PK\x03\x04zip".to_vec(), PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedDocument(_)));

        let err = ex
            .extract(EncryptedDocument::new(Vec::new(), PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedDocument(_)));
    }

    #[tokio::test]
    async fn zero_page_document_is_malformed() {
        let ex = extractor(0, MockPageRasterizer::new(), MockOcrEngine::new(FRONT, 90.0));
        let err = ex.extract(request()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedDocument(_)));
    }

    #[tokio::test]
    async fn oversize_document_fails_validation() {
        let ex = extractor(1, MockPageRasterizer::new(), MockOcrEngine::new(FRONT, 90.0))
            .with_config(PipelineConfig {
                max_document_bytes: 8,
                ..PipelineConfig::default()
            });
        let err = ex.extract(request()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Validation(_)));
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unreadable_scan_is_poor_quality() {
        let ex = extractor(
            1,
            MockPageRasterizer::new(),
            MockOcrEngine::new("~~ .. ;;", 12.0),
        );
        let err = ex.extract(request()).await.unwrap_err();
        match err {
            ExtractionError::PoorImageQuality {
                recognition_confidence,
                found_fields,
            } => {
                assert!(recognition_confidence < 35.0);
                assert_eq!(found_fields, 0);
            }
            other => panic!("expected PoorImageQuality, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn low_confidence_with_many_fields_still_succeeds() {
        let text = format!("{FRONT}\n{BACK}");
        let ex = extractor(1, MockPageRasterizer::new(), MockOcrEngine::new(&text, 20.0));
        let result = ex.extract(request()).await.unwrap();
        assert!(result.found_count() >= 6);
        assert!(result
            .warnings()
            .iter()
            .any(|w| matches!(w, ExtractionWarning::LowConfidencePage { page: 1, .. })));
    }

    #[tokio::test]
    async fn empty_middle_page_lowers_score_but_keeps_fields() {
        let full = extractor(
            2,
            MockPageRasterizer::new(),
            MockOcrEngine::with_pages(&[(FRONT, 90.0), (BACK, 90.0)]),
        )
        .extract(request())
        .await
        .unwrap();

        let with_blank = extractor(
            3,
            MockPageRasterizer::new(),
            MockOcrEngine::with_pages(&[(FRONT, 90.0), ("", 0.0), (BACK, 90.0)]),
        )
        .extract(request())
        .await
        .unwrap();

        assert_eq!(with_blank.page_count(), 3);
        assert_eq!(with_blank.found_count(), full.found_count());
        assert!(with_blank.confidence_score() > 0.0);
        assert!(with_blank.confidence_score() < full.confidence_score());
        assert_eq!(
            with_blank.warnings(),
            &[ExtractionWarning::EmptyPage { page: 2 }]
        );
    }

    #[tokio::test]
    async fn recognition_failure_degrades_to_warning() {
        let ex = extractor(
            2,
            MockPageRasterizer::new(),
            MockOcrEngine::with_pages(&[(FRONT, 90.0), (BACK, 90.0)])
                .failing_on(1, "engine crashed"),
        );
        let result = ex.extract(request()).await.unwrap();
        assert!(result.is_found(FieldName::IdNumber));
        assert!(!result.is_found(FieldName::Pincode));
        assert_eq!(
            result.warnings(),
            &[ExtractionWarning::RecognitionFailed {
                page: 2,
                reason: "engine crashed".into(),
            }]
        );
    }

    #[tokio::test]
    async fn rasterization_failure_fails_request() {
        let ex = extractor(
            3,
            MockPageRasterizer::new().failing_on(1),
            MockOcrEngine::new(FRONT, 90.0),
        );
        let err = ex.extract(request()).await.unwrap_err();
        match err {
            ExtractionError::Rasterization { page, .. } => assert_eq!(page, 2),
            other => panic!("expected Rasterization, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_rendering_times_out() {
        let ex = extractor(
            1,
            MockPageRasterizer::new().with_delay(Duration::from_millis(400)),
            MockOcrEngine::new(FRONT, 90.0),
        )
        .with_config(PipelineConfig {
            rasterize_timeout: Duration::from_millis(50),
            ..PipelineConfig::default()
        });
        let err = ex.extract(request()).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Timeout {
                stage: Stage::Rasterization,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn slow_recognition_times_out() {
        let ex = extractor(
            1,
            MockPageRasterizer::new(),
            MockOcrEngine::new(FRONT, 90.0).with_delay(Duration::from_millis(400)),
        )
        .with_config(PipelineConfig {
            recognize_timeout: Duration::from_millis(50),
            ..PipelineConfig::default()
        });
        let err = ex.extract(request()).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Timeout {
                stage: Stage::Recognition,
                ..
            }
        ));
        assert_eq!(err.code(), "TIMEOUT");
    }

    struct SlowDecryptor(Duration);

    impl Decryptor for SlowDecryptor {
        fn decrypt(
            &self,
            document: &EncryptedDocument,
        ) -> Result<DecryptedDocument, ExtractionError> {
            std::thread::sleep(self.0);
            Ok(DecryptedDocument::new(
                document.bytes().to_vec(),
                document.password().to_string(),
                1,
            ))
        }
    }

    #[tokio::test]
    async fn slow_decryption_times_out() {
        let ex = IdentityExtractor::new(
            Arc::new(SlowDecryptor(Duration::from_millis(400))),
            Arc::new(MockPageRasterizer::new()),
            Arc::new(PreprocessChain::standard()),
            Arc::new(MockOcrEngine::new(FRONT, 90.0)),
        )
        .with_config(PipelineConfig {
            decrypt_timeout: Duration::from_millis(50),
            ..PipelineConfig::default()
        });
        let err = ex.extract(request()).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Timeout {
                stage: Stage::Decryption,
                ..
            }
        ));
    }

    /// OCR engine that panics on one page and reads the other.
    struct PanickingOcr {
        inner: MockOcrEngine,
        panic_on: usize,
    }

    impl OcrEngine for PanickingOcr {
        fn recognize(&self, image: &PreprocessedImage) -> Result<RecognitionResult, String> {
            if image.index == self.panic_on {
                panic!("engine fault on page {}", image.index + 1);
            }
            self.inner.recognize(image)
        }
    }

    #[tokio::test]
    async fn recognition_panic_degrades_to_warning() {
        let ex = IdentityExtractor::new(
            Arc::new(MockDecryptor::new(PASSWORD, 2)),
            Arc::new(MockPageRasterizer::new()),
            Arc::new(PreprocessChain::standard()),
            Arc::new(PanickingOcr {
                inner: MockOcrEngine::with_pages(&[(FRONT, 90.0), (BACK, 90.0)]),
                panic_on: 1,
            }),
        );
        let result = ex.extract(request()).await.unwrap();
        assert!(result.is_found(FieldName::IdNumber));
        assert!(!result.is_found(FieldName::Pincode));
        match result.warnings() {
            [ExtractionWarning::RecognitionFailed { page, reason }] => {
                assert_eq!(*page, 2);
                assert!(reason.starts_with("Recognition aborted"), "{reason}");
            }
            other => panic!("expected one RecognitionFailed warning, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn recognition_panic_never_reported_as_rendering_error() {
        let ex = IdentityExtractor::new(
            Arc::new(MockDecryptor::new(PASSWORD, 1)),
            Arc::new(MockPageRasterizer::new()),
            Arc::new(PreprocessChain::standard()),
            Arc::new(PanickingOcr {
                inner: MockOcrEngine::new(FRONT, 90.0),
                panic_on: 0,
            }),
        );
        // The only page is lost, so the request ends as an unreadable scan.
        let err = ex.extract(request()).await.unwrap_err();
        assert_eq!(err.code(), "POOR_IMAGE_QUALITY");
    }

    struct PanickingPreprocessor;

    impl ImagePreprocessor for PanickingPreprocessor {
        fn preprocess(&self, _page: &PageImage) -> PreprocessedImage {
            panic!("preprocess chain fault");
        }
    }

    #[tokio::test]
    async fn preprocessing_panic_falls_back_to_unprocessed_page() {
        let ex = IdentityExtractor::new(
            Arc::new(MockDecryptor::new(PASSWORD, 2)),
            Arc::new(MockPageRasterizer::new()),
            Arc::new(PanickingPreprocessor),
            Arc::new(MockOcrEngine::with_pages(&[(FRONT, 90.0), (BACK, 90.0)])),
        );
        let result = ex.extract(request()).await.unwrap();
        assert_eq!(result.found_count(), 11);
        assert!(result.warnings().is_empty());
    }

    #[tokio::test]
    async fn pages_concatenate_in_document_order() {
        // Both pages carry a labelled DOB; the first one in text order wins.
        let ex = extractor(
            2,
            MockPageRasterizer::new(),
            MockOcrEngine::with_pages(&[
                ("Ravi Kumar\nDOB: 01/01/1980\nMALE", 90.0),
                ("Ravi Kumar\nDOB: 02/02/1990\nMALE", 90.0),
            ]),
        )
        .with_config(PipelineConfig {
            max_parallel_pages: 2,
            ..PipelineConfig::default()
        });
        for _ in 0..5 {
            let result = ex.extract(request()).await.unwrap();
            assert_eq!(result.value(FieldName::Dob).as_deref(), Some("01/01/1980"));
        }
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_extractor() {
        let ex = Arc::new(extractor(
            2,
            MockPageRasterizer::new(),
            MockOcrEngine::with_pages(&[(FRONT, 90.0), (BACK, 90.0)]),
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ex = Arc::clone(&ex);
                tokio::spawn(async move { ex.extract(request()).await })
            })
            .collect();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.found_count(), 11);
        }
    }

    #[test]
    fn fingerprint_is_short_hex() {
        let fp = fingerprint(b"%PDF-1.7");
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
