use std::path::{Path, PathBuf};

/// Application-level constants
pub const APP_NAME: &str = "aadhaar-extract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// Environment variables
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_DYNAMIC_LIB_PATH";
pub const TESSDATA_DIR_ENV: &str = "AADHAAR_TESSDATA_DIR";
pub const TESSDATA_PREFIX_ENV: &str = "TESSDATA_PREFIX";
pub const PASSWORD_ENV: &str = "AADHAAR_PDF_PASSWORD";

pub const ENV_RECOGNITION_WEIGHT: &str = "AADHAAR_RECOGNITION_WEIGHT";
pub const ENV_COMPLETENESS_WEIGHT: &str = "AADHAAR_COMPLETENESS_WEIGHT";
pub const ENV_MIN_RECOGNITION_CONFIDENCE: &str = "AADHAAR_MIN_RECOGNITION_CONFIDENCE";
pub const ENV_MIN_FOUND_FRACTION: &str = "AADHAAR_MIN_FOUND_FRACTION";
pub const ENV_LOW_PAGE_CONFIDENCE: &str = "AADHAAR_LOW_PAGE_CONFIDENCE";
pub const ENV_DECRYPT_TIMEOUT_SECS: &str = "AADHAAR_DECRYPT_TIMEOUT_SECS";
pub const ENV_RASTERIZE_TIMEOUT_SECS: &str = "AADHAAR_RASTERIZE_TIMEOUT_SECS";
pub const ENV_RECOGNIZE_TIMEOUT_SECS: &str = "AADHAAR_RECOGNIZE_TIMEOUT_SECS";
pub const ENV_MAX_PARALLEL_PAGES: &str = "AADHAAR_MAX_PARALLEL_PAGES";
pub const ENV_MAX_DOCUMENT_BYTES: &str = "AADHAAR_MAX_DOCUMENT_BYTES";
pub const ENV_VERIFY_ID_CHECKSUM: &str = "AADHAAR_VERIFY_ID_CHECKSUM";

/// Log filter when `RUST_LOG` is unset. Engine crates stay at warn.
pub fn default_log_filter() -> String {
    format!("aadhaar_extract=info,pdfium_render=warn,{}", "warn")
}

/// Usual tessdata locations on Linux and macOS package installs.
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Locate the tessdata directory.
///
/// Discovery order:
/// 1. `AADHAAR_TESSDATA_DIR`
/// 2. `TESSDATA_PREFIX` (the directory itself, or its `tessdata` child)
/// 3. System install locations
pub fn discover_tessdata_dir() -> Option<PathBuf> {
    discover_tessdata_dir_with(|key| std::env::var(key).ok(), SYSTEM_TESSDATA_DIRS)
}

fn discover_tessdata_dir_with(
    lookup: impl Fn(&str) -> Option<String>,
    system_dirs: &[&str],
) -> Option<PathBuf> {
    if let Some(dir) = lookup(TESSDATA_DIR_ENV) {
        // Explicit setting wins even if wrong, so the engine reports it.
        return Some(PathBuf::from(dir));
    }

    if let Some(prefix) = lookup(TESSDATA_PREFIX_ENV) {
        let prefix = PathBuf::from(prefix);
        for candidate in [prefix.clone(), prefix.join("tessdata")] {
            if has_traineddata(&candidate) {
                return Some(candidate);
            }
        }
    }

    system_dirs
        .iter()
        .map(PathBuf::from)
        .find(|dir| has_traineddata(dir))
}

fn has_traineddata(dir: &Path) -> bool {
    dir.join("eng.traineddata").exists()
}
