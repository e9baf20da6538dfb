use super::confidence::page_confidence;
use super::types::{BoundingBox, OcrEngine, OcrWordResult, PreprocessedImage, RecognitionResult};

/// Languages recognized jointly in one pass, so mixed-script lines
/// (Tamil label, English value) come out of a single recognition.
pub const OCR_LANGUAGES: &str = "eng+tam";

/// Bundled Tesseract OCR engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct BundledTesseract {
    tessdata_dir: std::path::PathBuf,
}

#[cfg(feature = "ocr")]
impl BundledTesseract {
    /// Initialize with a tessdata directory holding every pack in `OCR_LANGUAGES`.
    pub fn new(tessdata_dir: &std::path::Path) -> Result<Self, super::EngineError> {
        use super::EngineError;

        if !tessdata_dir.is_dir() {
            return Err(EngineError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }
        for lang in OCR_LANGUAGES.split('+') {
            if !tessdata_dir.join(format!("{lang}.traineddata")).exists() {
                return Err(EngineError::MissingLanguage {
                    lang: lang.to_string(),
                    dir: tessdata_dir.to_path_buf(),
                });
            }
        }

        // Probe once so a broken install fails at startup, not on the first page.
        let path = tessdata_dir
            .to_str()
            .ok_or_else(|| EngineError::OcrInit("Invalid tessdata path".into()))?;
        tesseract::Tesseract::new(Some(path), Some(OCR_LANGUAGES))
            .map_err(|e| EngineError::OcrInit(format!("{e:?}")))?;

        tracing::info!(
            dir = %tessdata_dir.display(),
            langs = OCR_LANGUAGES,
            "Tesseract ready"
        );

        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for BundledTesseract {
    fn recognize(&self, image: &PreprocessedImage) -> Result<RecognitionResult, String> {
        use tesseract::{PageSegMode, Tesseract};

        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| "Invalid tessdata path".to_string())?;

        let png = super::preprocess::encode_png(&image.image)?;

        // The handle is not Sync, so each page gets its own.
        let mut tess = Tesseract::new(Some(tessdata_str), Some(OCR_LANGUAGES))
            .map_err(|e| format!("{e:?}"))?
            .set_image_from_mem(&png)
            .map_err(|e| format!("{e:?}"))?;
        tess.set_page_seg_mode(PageSegMode::PsmSingleBlock);

        let text = tess.get_text().map_err(|e| format!("{e:?}"))?;

        let words = match tess.get_tsv_text(0) {
            Ok(tsv) => parse_tsv_words(&tsv),
            Err(_) => {
                // Fallback: split text with the engine's page mean (no bounding boxes)
                let mean = tess.mean_text_conf().max(0) as f32;
                text.split_whitespace()
                    .map(|w| OcrWordResult {
                        text: w.to_string(),
                        confidence: mean,
                        bounding_box: None,
                    })
                    .collect()
            }
        };

        Ok(RecognitionResult {
            page_index: image.index,
            confidence: page_confidence(&words),
            text,
            words,
        })
    }
}

/// Mock OCR engine for unit testing without Tesseract.
///
/// Returns one scripted page per call, chosen by page index. Pages past the
/// end of the script repeat the last entry.
pub struct MockOcrEngine {
    pages: Vec<MockPage>,
    delay: Option<std::time::Duration>,
}

enum MockPage {
    Text { text: String, confidence: f32 },
    Fail(String),
}

impl MockOcrEngine {
    /// Every page recognizes as `text` with the given token confidence.
    pub fn new(text: &str, confidence: f32) -> Self {
        Self::with_pages(&[(text, confidence)])
    }

    /// Per-page script, indexed by page position.
    pub fn with_pages(pages: &[(&str, f32)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(text, confidence)| MockPage::Text {
                    text: text.to_string(),
                    confidence: *confidence,
                })
                .collect(),
            delay: None,
        }
    }

    /// Make page `index` fail with an engine error.
    pub fn failing_on(mut self, index: usize, reason: &str) -> Self {
        while self.pages.len() <= index {
            let last = match self.pages.last() {
                Some(MockPage::Text { text, confidence }) => MockPage::Text {
                    text: text.clone(),
                    confidence: *confidence,
                },
                _ => MockPage::Text {
                    text: String::new(),
                    confidence: 0.0,
                },
            };
            self.pages.push(last);
        }
        self.pages[index] = MockPage::Fail(reason.to_string());
        self
    }

    /// Block for `delay` before each recognition.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, image: &PreprocessedImage) -> Result<RecognitionResult, String> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let page = self.pages.get(image.index).or_else(|| self.pages.last());
        let (text, confidence) = match page {
            Some(MockPage::Text { text, confidence }) => (text.clone(), *confidence),
            Some(MockPage::Fail(reason)) => return Err(reason.clone()),
            None => (String::new(), 0.0),
        };

        let words: Vec<OcrWordResult> = text
            .split_whitespace()
            .map(|w| OcrWordResult {
                text: w.to_string(),
                confidence,
                bounding_box: None,
            })
            .collect();

        Ok(RecognitionResult {
            page_index: image.index,
            confidence: page_confidence(&words),
            text,
            words,
        })
    }
}

/// Parse Tesseract TSV output into words with confidence and bounding boxes.
/// TSV columns: level page_num block_num par_num line_num word_num left top width height conf text
/// Level 5 = individual word entries. Confidence stays on the engine's 0-100 scale.
pub fn parse_tsv_words(tsv: &str) -> Vec<OcrWordResult> {
    let mut results = Vec::new();

    for line in tsv.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // Level 5 = word; the header row fails to parse and is skipped here
        let level: i32 = match fields[0].parse() {
            Ok(l) => l,
            Err(_) => continue,
        };
        if level != 5 {
            continue;
        }

        let conf: f32 = match fields[10].trim().parse() {
            Ok(c) => c,
            Err(_) => continue,
        };

        let word = fields[11].trim();
        if word.is_empty() {
            continue;
        }

        // Tesseract returns -1 for words it can't assign confidence to
        let confidence = conf.clamp(0.0, 100.0);

        let bounding_box = parse_bounding_box(fields[6], fields[7], fields[8], fields[9]);

        results.push(OcrWordResult {
            text: word.to_string(),
            confidence,
            bounding_box,
        });
    }

    results
}

/// Returns None if any field fails to parse.
fn parse_bounding_box(left: &str, top: &str, width: &str, height: &str) -> Option<BoundingBox> {
    Some(BoundingBox {
        x: left.parse().ok()?,
        y: top.parse().ok()?,
        width: width.parse().ok()?,
        height: height.parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    fn blank(index: usize) -> PreprocessedImage {
        PreprocessedImage {
            index,
            image: GrayImage::new(4, 4),
        }
    }

    const TSV_HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn mock_ocr_returns_configured_text() {
        let engine = MockOcrEngine::new("Ravi Kumar", 90.0);
        let result = engine.recognize(&blank(0)).unwrap();
        assert_eq!(result.text, "Ravi Kumar");
        assert_eq!(result.words.len(), 2);
        assert!((result.confidence - 90.0).abs() < f32::EPSILON);
    }

    #[test]
    fn mock_ocr_scripts_pages_by_index() {
        let engine = MockOcrEngine::with_pages(&[("one", 80.0), ("", 0.0), ("three", 70.0)]);
        assert_eq!(engine.recognize(&blank(0)).unwrap().text, "one");
        let empty = engine.recognize(&blank(1)).unwrap();
        assert!(empty.text.is_empty());
        assert_eq!(empty.confidence, 0.0);
        assert_eq!(engine.recognize(&blank(2)).unwrap().page_index, 2);
    }

    #[test]
    fn mock_ocr_failing_page() {
        let engine = MockOcrEngine::new("text", 80.0).failing_on(1, "engine crashed");
        assert!(engine.recognize(&blank(0)).is_ok());
        assert_eq!(engine.recognize(&blank(1)).unwrap_err(), "engine crashed");
    }

    #[test]
    fn tsv_parser_extracts_words_and_confidence() {
        let tsv = format!(
            "{TSV_HEADER}\n\
             5\t1\t1\t1\t1\t1\t10\t20\t80\t30\t96.5\tGovernment\n\
             5\t1\t1\t1\t1\t2\t95\t20\t30\t30\t91\tof\n\
             5\t1\t1\t1\t1\t3\t130\t20\t60\t30\t88\tIndia"
        );
        let words = parse_tsv_words(&tsv);
        assert_eq!(words.len(), 3);
        assert_eq!(words[0].text, "Government");
        assert!((words[0].confidence - 96.5).abs() < 0.01);
        assert!((words[2].confidence - 88.0).abs() < 0.01);
    }

    #[test]
    fn tsv_parser_extracts_bounding_boxes() {
        let tsv = format!("{TSV_HEADER}\n5\t1\t1\t1\t1\t1\t10\t20\t80\t30\t96\tMale");
        let words = parse_tsv_words(&tsv);
        let bb = words[0].bounding_box.as_ref().unwrap();
        assert_eq!((bb.x, bb.y, bb.width, bb.height), (10, 20, 80, 30));
    }

    #[test]
    fn tsv_parser_skips_non_word_levels() {
        let tsv = format!(
            "{TSV_HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t600\t400\t-1\t\n\
             4\t1\t1\t1\t1\t0\t10\t20\t200\t30\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t20\t80\t30\t93\tDOB"
        );
        let words = parse_tsv_words(&tsv);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "DOB");
    }

    #[test]
    fn tsv_parser_negative_confidence_counts_as_zero() {
        let tsv = format!("{TSV_HEADER}\n5\t1\t1\t1\t1\t1\t10\t20\t80\t30\t-1\t???");
        let words = parse_tsv_words(&tsv);
        assert_eq!(words[0].confidence, 0.0);
    }

    #[test]
    fn tsv_parser_keeps_tamil_words() {
        let tsv = format!("{TSV_HEADER}\n5\t1\t1\t1\t1\t1\t10\t20\t80\t30\t77\tபிறந்த");
        let words = parse_tsv_words(&tsv);
        assert_eq!(words[0].text, "பிறந்த");
    }

    #[test]
    fn tsv_parser_handles_empty_and_malformed_input() {
        assert!(parse_tsv_words("").is_empty());
        assert!(parse_tsv_words(TSV_HEADER).is_empty());
        assert!(parse_tsv_words("5\t1\t1\nnot\ta\tvalid\tline").is_empty());
    }

    #[test]
    fn tsv_parser_skips_empty_words() {
        let tsv = format!("{TSV_HEADER}\n5\t1\t1\t1\t1\t1\t10\t20\t80\t30\t90\t   ");
        assert!(parse_tsv_words(&tsv).is_empty());
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn bundled_tesseract_rejects_missing_tessdata() {
        let result = BundledTesseract::new(std::path::Path::new("/nonexistent/tessdata"));
        assert!(matches!(
            result,
            Err(crate::pipeline::extraction::EngineError::TessdataNotFound(_))
        ));
    }
}
