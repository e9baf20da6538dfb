//! Pipeline configuration: scoring weights, quality thresholds, per-stage
//! timeouts and request limits.
//!
//! Defaults are tuned on card scans rendered at 300 DPI. Every value can be
//! overridden from the environment (see `config` for the variable names).

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::pipeline::extraction::thresholds;

// ═══════════════════════════════════════════════════════════
// Defaults
// ═══════════════════════════════════════════════════════════

const DEFAULT_RECOGNITION_WEIGHT: f32 = 0.4;
const DEFAULT_COMPLETENESS_WEIGHT: f32 = 0.6;
const DEFAULT_MIN_RECOGNITION_CONFIDENCE: f32 = 35.0;
/// 3 of the 11 target fields.
const DEFAULT_MIN_FOUND_FRACTION: f32 = 3.0 / 11.0;
const DEFAULT_LOW_PAGE_CONFIDENCE: f32 = thresholds::LOW_PAGE;
const DEFAULT_DECRYPT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RASTERIZE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RECOGNIZE_TIMEOUT: Duration = Duration::from_secs(60);
/// Upload limit of the transport layer.
const DEFAULT_MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Weight of mean recognition confidence in the combined score.
    pub recognition_weight: f32,
    /// Weight of field completeness in the combined score.
    pub completeness_weight: f32,
    /// Below this mean recognition confidence (0-100) a scan may be unreadable.
    pub min_recognition_confidence: f32,
    /// Below this fraction of found fields a scan may be unreadable.
    pub min_found_fraction: f32,
    /// Pages below this confidence get a warning.
    pub low_page_confidence: f32,
    pub decrypt_timeout: Duration,
    /// Per page.
    pub rasterize_timeout: Duration,
    /// Per page.
    pub recognize_timeout: Duration,
    /// Pages processed concurrently within one request.
    pub max_parallel_pages: usize,
    pub max_document_bytes: usize,
    /// Also require a valid Verhoeff check digit on the 12-digit ID.
    pub verify_id_checksum: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recognition_weight: DEFAULT_RECOGNITION_WEIGHT,
            completeness_weight: DEFAULT_COMPLETENESS_WEIGHT,
            min_recognition_confidence: DEFAULT_MIN_RECOGNITION_CONFIDENCE,
            min_found_fraction: DEFAULT_MIN_FOUND_FRACTION,
            low_page_confidence: DEFAULT_LOW_PAGE_CONFIDENCE,
            decrypt_timeout: DEFAULT_DECRYPT_TIMEOUT,
            rasterize_timeout: DEFAULT_RASTERIZE_TIMEOUT,
            recognize_timeout: DEFAULT_RECOGNIZE_TIMEOUT,
            max_parallel_pages: default_parallelism(),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            verify_id_checksum: false,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ═══════════════════════════════════════════════════════════
// Derivation
// ═══════════════════════════════════════════════════════════

impl PipelineConfig {
    /// Defaults with environment overrides applied. Unparseable values are
    /// logged and ignored.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        override_parsed(&lookup, config::ENV_RECOGNITION_WEIGHT, &mut self.recognition_weight);
        override_parsed(&lookup, config::ENV_COMPLETENESS_WEIGHT, &mut self.completeness_weight);
        override_parsed(
            &lookup,
            config::ENV_MIN_RECOGNITION_CONFIDENCE,
            &mut self.min_recognition_confidence,
        );
        override_parsed(&lookup, config::ENV_MIN_FOUND_FRACTION, &mut self.min_found_fraction);
        override_parsed(&lookup, config::ENV_LOW_PAGE_CONFIDENCE, &mut self.low_page_confidence);
        override_secs(&lookup, config::ENV_DECRYPT_TIMEOUT_SECS, &mut self.decrypt_timeout);
        override_secs(&lookup, config::ENV_RASTERIZE_TIMEOUT_SECS, &mut self.rasterize_timeout);
        override_secs(&lookup, config::ENV_RECOGNIZE_TIMEOUT_SECS, &mut self.recognize_timeout);
        override_parsed(&lookup, config::ENV_MAX_PARALLEL_PAGES, &mut self.max_parallel_pages);
        override_parsed(&lookup, config::ENV_MAX_DOCUMENT_BYTES, &mut self.max_document_bytes);
        override_parsed(&lookup, config::ENV_VERIFY_ID_CHECKSUM, &mut self.verify_id_checksum);
        self.max_parallel_pages = self.max_parallel_pages.max(1);
        self
    }

    /// Score weights normalised to sum to 1. Negative or all-zero weights
    /// fall back to the defaults.
    pub fn score_weights(&self) -> (f32, f32) {
        let r = self.recognition_weight;
        let c = self.completeness_weight;
        let valid = r.is_finite() && c.is_finite() && r >= 0.0 && c >= 0.0 && r + c > 0.0;
        let (r, c) = if valid {
            (r, c)
        } else {
            (DEFAULT_RECOGNITION_WEIGHT, DEFAULT_COMPLETENESS_WEIGHT)
        };
        (r / (r + c), c / (r + c))
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable config override"),
    }
}

fn override_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut Duration) {
    let mut secs = slot.as_secs_f64();
    override_parsed(lookup, key, &mut secs);
    if secs.is_finite() && secs > 0.0 {
        *slot = Duration::from_secs_f64(secs);
    } else {
        tracing::warn!(key, secs, "Ignoring non-positive timeout override");
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
