//! Image preparation before upload.
//!
//! Small files go out untouched. Anything at or above the passthrough size is
//! decoded, scaled so its longest edge fits `max_dimension` (never upscaled),
//! and re-encoded as high-quality JPEG. The server runs OCR on every upload,
//! so the encoder setting favours legible small print over file size.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use tracing::debug;

use crate::config::{JPEG_QUALITY, MAX_DIMENSION, PASSTHROUGH_BELOW_BYTES};
use crate::error::GalleryError;
use crate::models::source::with_extension;
use crate::models::{SourceFile, TransmitUnit};

/// Media type of every re-encoded payload.
pub const OUTPUT_MEDIA_TYPE: &str = "image/jpeg";

// ═══════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    /// Files strictly smaller than this are sent as-is.
    pub passthrough_below_bytes: u64,
    /// Longest edge of the re-encoded image.
    pub max_dimension: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            passthrough_below_bytes: PASSTHROUGH_BELOW_BYTES,
            max_dimension: MAX_DIMENSION,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ImagePreprocessor trait
// ═══════════════════════════════════════════════════════════

/// Turns a picked file into a transmit-ready payload.
///
/// Pure CPU work: no I/O, no network. Callers run it on a blocking thread.
pub trait ImagePreprocessor: Send + Sync {
    fn prepare(&self, file: SourceFile) -> Result<TransmitUnit, GalleryError>;
}

// ═══════════════════════════════════════════════════════════
// DownsamplePreprocessor
// ═══════════════════════════════════════════════════════════

/// Production preprocessor: passthrough for small files, downscale + JPEG otherwise.
#[derive(Debug, Clone, Default)]
pub struct DownsamplePreprocessor {
    config: PreprocessConfig,
}

impl DownsamplePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }
}

impl ImagePreprocessor for DownsamplePreprocessor {
    fn prepare(&self, file: SourceFile) -> Result<TransmitUnit, GalleryError> {
        if file.size() < self.config.passthrough_below_bytes {
            debug!(file = %file.name, size = file.size(), "Small image, sending untouched");
            return Ok(TransmitUnit::passthrough(file));
        }

        let img = image::load_from_memory(&file.bytes)
            .map_err(|e| GalleryError::Encoding(format!("Failed to decode {}: {e}", file.name)))?;
        let (orig_w, orig_h) = img.dimensions();
        let (new_w, new_h) = compute_scaled_dimensions(orig_w, orig_h, self.config.max_dimension);

        let rgb = flatten_to_rgb(img);
        let rgb = if (new_w, new_h) == (orig_w, orig_h) {
            rgb
        } else {
            image::imageops::resize(&rgb, new_w, new_h, FilterType::CatmullRom)
        };

        let bytes = encode_jpeg(&rgb, self.config.jpeg_quality)?;

        debug!(
            file = %file.name,
            original = format!("{orig_w}x{orig_h}"),
            output = format!("{new_w}x{new_h}"),
            before = file.size(),
            after = bytes.len(),
            "Image downsampled for upload"
        );

        Ok(TransmitUnit {
            file_name: with_extension(&file.name, "jpg"),
            media_type: OUTPUT_MEDIA_TYPE.to_string(),
            bytes,
            quality: Some(self.config.jpeg_quality),
            dimensions: Some((new_w, new_h)),
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Pure helper functions
// ═══════════════════════════════════════════════════════════

/// Uniformly scale so the longest edge is at most `max_dimension`.
///
/// `scale = min(1, max_dimension / max(w, h))`, each side rounded. Small
/// images are NOT upscaled.
pub fn compute_scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width.max(1), height.max(1));
    }

    let longest = width.max(height) as f64;
    let scale = (max_dimension as f64 / longest).min(1.0);

    let new_w = ((width as f64 * scale).round() as u32).max(1);
    let new_h = ((height as f64 * scale).round() as u32).max(1);

    (new_w, new_h)
}

/// Drop alpha by compositing onto white; JPEG has no transparency.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Encode an RGB image as JPEG bytes at the given quality.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, GalleryError> {
    let mut cursor = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
    img.write_with_encoder(encoder)
        .map_err(|e| GalleryError::Encoding(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

// ═══════════════════════════════════════════════════════════
// Mock implementations (testing)
// ═══════════════════════════════════════════════════════════

/// Preprocessor that never decodes: passes files through, or fails on demand.
pub struct MockPreprocessor {
    fail_on: Vec<String>,
}

impl MockPreprocessor {
    pub fn new() -> Self {
        Self { fail_on: vec![] }
    }

    /// Fail with an encoding error for files with this name.
    pub fn failing_for(mut self, name: &str) -> Self {
        self.fail_on.push(name.to_string());
        self
    }
}

impl Default for MockPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePreprocessor for MockPreprocessor {
    fn prepare(&self, file: SourceFile) -> Result<TransmitUnit, GalleryError> {
        if self.fail_on.contains(&file.name) {
            return Err(GalleryError::Encoding(format!(
                "Mock encoding failure for {}",
                file.name
            )));
        }
        Ok(TransmitUnit::passthrough(file))
    }
}
