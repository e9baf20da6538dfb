//! Image preprocessing services for OCR input.
//!
//! **Services architecture**: each step is an independent service behind a
//! trait. `PreprocessChain` composes them in a fixed order:
//!
//! 1. grayscale (BT.601 luminance)
//! 2. denoise (3x3 median)
//! 3. binarize (adaptive Gaussian threshold, block 11, C = 2)
//! 4. enhance (contrast stretch, optional)
//!
//! Key rules:
//! - The chain is pure: same input pixels, same output pixels.
//! - No step fails. A step that cannot help returns its input unchanged.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, RgbImage};
use tracing::debug;

use super::types::{PageImage, PreprocessedImage};

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Neighbourhood size for adaptive thresholding (odd).
pub const THRESHOLD_BLOCK_SIZE: u32 = 11;

/// Constant subtracted from the local weighted mean.
pub const THRESHOLD_C: f32 = 2.0;

/// Median filter aperture.
const MEDIAN_APERTURE: u32 = 3;

/// Below this spread (max - min) the image is treated as flat and left alone.
const MIN_CONTRAST_SPREAD: u8 = 8;

// ═══════════════════════════════════════════════════════════
// Service traits
// ═══════════════════════════════════════════════════════════

/// Reduces a color page to a single luminance channel.
pub trait GrayscaleConverter: Send + Sync {
    fn to_gray(&self, image: &DynamicImage) -> GrayImage;
}

/// Removes salt-and-pepper noise from scanned pages.
pub trait Denoiser: Send + Sync {
    fn denoise(&self, image: GrayImage) -> GrayImage;
}

/// Turns a grayscale page into black text on white background.
pub trait Binarizer: Send + Sync {
    fn binarize(&self, image: GrayImage) -> GrayImage;
}

/// Final contrast/sharpness pass. Passthrough when there is nothing to gain.
pub trait Enhancer: Send + Sync {
    fn enhance(&self, image: GrayImage) -> GrayImage;
}

/// Turns one rasterized page into OCR-ready pixels. Infallible by contract.
pub trait ImagePreprocessor: Send + Sync {
    fn preprocess(&self, page: &PageImage) -> PreprocessedImage;
}

// ═══════════════════════════════════════════════════════════
// PreprocessChain — composes services
// ═══════════════════════════════════════════════════════════

pub struct PreprocessChain {
    grayscale: Box<dyn GrayscaleConverter>,
    denoiser: Box<dyn Denoiser>,
    binarizer: Box<dyn Binarizer>,
    enhancer: Option<Box<dyn Enhancer>>,
}

impl PreprocessChain {
    pub fn new(
        grayscale: Box<dyn GrayscaleConverter>,
        denoiser: Box<dyn Denoiser>,
        binarizer: Box<dyn Binarizer>,
    ) -> Self {
        Self {
            grayscale,
            denoiser,
            binarizer,
            enhancer: None,
        }
    }

    /// Add the optional enhancement pass.
    pub fn with_enhancer(mut self, enhancer: Box<dyn Enhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    /// Production chain for card scans rendered at 300 DPI.
    pub fn standard() -> Self {
        Self::new(
            Box::new(Bt601Grayscale),
            Box::new(MedianDenoiser),
            Box::new(AdaptiveGaussianBinarizer::default()),
        )
        .with_enhancer(Box::new(ContrastStretcher))
    }
}

impl Default for PreprocessChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl ImagePreprocessor for PreprocessChain {
    fn preprocess(&self, page: &PageImage) -> PreprocessedImage {
        let gray = self.grayscale.to_gray(&page.image);
        let denoised = self.denoiser.denoise(gray);
        let binary = self.binarizer.binarize(denoised);
        let image = match &self.enhancer {
            Some(enhancer) => enhancer.enhance(binary),
            None => binary,
        };

        debug!(
            page = page.index + 1,
            width = image.width(),
            height = image.height(),
            "Page preprocessed"
        );

        PreprocessedImage {
            index: page.index,
            image,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Service implementations
// ═══════════════════════════════════════════════════════════

/// ITU-R BT.601 luminance, the same weights OCR engines assume.
pub struct Bt601Grayscale;

impl GrayscaleConverter for Bt601Grayscale {
    fn to_gray(&self, image: &DynamicImage) -> GrayImage {
        match image {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            other => rgb_to_gray(&other.to_rgb8()),
        }
    }
}

/// 3x3 median filter with replicated borders.
pub struct MedianDenoiser;

impl Denoiser for MedianDenoiser {
    fn denoise(&self, image: GrayImage) -> GrayImage {
        if image.width() < MEDIAN_APERTURE || image.height() < MEDIAN_APERTURE {
            return image;
        }
        median_filter_3x3(&image)
    }
}

/// Adaptive threshold against a Gaussian-weighted local mean.
///
/// A pixel is white when it is brighter than `mean - c`, black otherwise.
pub struct AdaptiveGaussianBinarizer {
    block_size: u32,
    c: f32,
}

impl Default for AdaptiveGaussianBinarizer {
    fn default() -> Self {
        Self {
            block_size: THRESHOLD_BLOCK_SIZE,
            c: THRESHOLD_C,
        }
    }
}

impl Binarizer for AdaptiveGaussianBinarizer {
    fn binarize(&self, image: GrayImage) -> GrayImage {
        if image.width() < self.block_size || image.height() < self.block_size {
            debug!(
                width = image.width(),
                height = image.height(),
                "Image smaller than threshold block, skipping binarization"
            );
            return image;
        }

        let kernel = gaussian_kernel(self.block_size);
        let mean = separable_blur(&image, &kernel);

        let (w, h) = image.dimensions();
        let mut out = GrayImage::new(w, h);
        let mut any_white = false;
        for y in 0..h {
            for x in 0..w {
                let src = image.get_pixel(x, y).0[0] as f32;
                let local = mean[(y * w + x) as usize];
                let v = if src > local - self.c {
                    any_white = true;
                    255
                } else {
                    0
                };
                out.put_pixel(x, y, Luma([v]));
            }
        }

        // An all-black page carries less than the input did.
        if !any_white {
            debug!("Threshold produced an all-black page, keeping grayscale");
            return image;
        }
        out
    }
}

/// Linear stretch of the occupied intensity range to 0-255.
/// No-op on binary or flat images.
pub struct ContrastStretcher;

impl Enhancer for ContrastStretcher {
    fn enhance(&self, mut image: GrayImage) -> GrayImage {
        let (min, max) = image
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));

        if min > max || (min == 0 && max == 255) || max - min < MIN_CONTRAST_SPREAD {
            return image;
        }

        let span = (max - min) as f32;
        for p in image.pixels_mut() {
            let v = ((p.0[0] - min) as f32 * 255.0 / span).round();
            p.0[0] = v.clamp(0.0, 255.0) as u8;
        }
        image
    }
}

// ═══════════════════════════════════════════════════════════
// Pixel helpers
// ═══════════════════════════════════════════════════════════

/// Convert RGB image to grayscale using ITU-R BT.601 luminance.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = (rgb.width(), rgb.height());
    let mut gray = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let p = rgb.get_pixel(x, y);
            let luma = (0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32)
                .round()
                .min(255.0) as u8;
            gray.put_pixel(x, y, Luma([luma]));
        }
    }
    gray
}

fn clamp_coord(v: i64, len: u32) -> u32 {
    v.clamp(0, len as i64 - 1) as u32
}

fn median_filter_3x3(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    let mut window = [0u8; 9];
    for y in 0..h {
        for x in 0..w {
            let mut i = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sx = clamp_coord(x as i64 + dx, w);
                    let sy = clamp_coord(y as i64 + dy, h);
                    window[i] = img.get_pixel(sx, sy).0[0];
                    i += 1;
                }
            }
            window.sort_unstable();
            out.put_pixel(x, y, Luma([window[4]]));
        }
    }
    out
}

/// Normalised 1-D Gaussian weights. Sigma follows the usual
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8` rule for a given aperture.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let weights: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|v| v / sum).collect()
}

/// Separable convolution with replicated borders. Returns row-major f32 values.
fn separable_blur(img: &GrayImage, kernel: &[f32]) -> Vec<f32> {
    let (w, h) = img.dimensions();
    let half = (kernel.len() / 2) as i64;

    let mut horizontal = vec![0.0f32; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = clamp_coord(x as i64 + k as i64 - half, w);
                acc += weight * img.get_pixel(sx, y).0[0] as f32;
            }
            horizontal[(y * w + x) as usize] = acc;
        }
    }

    let mut out = vec![0.0f32; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = clamp_coord(y as i64 + k as i64 - half, h);
                acc += weight * horizontal[(sy * w + x) as usize];
            }
            out[(y * w + x) as usize] = acc;
        }
    }
    out
}

/// Encode a grayscale image as PNG bytes (for the OCR engine's image loader).
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, String> {
    let dynamic = DynamicImage::ImageLuma8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {e}"))?;
    Ok(cursor.into_inner())
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
