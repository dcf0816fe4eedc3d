//! Core types shared by the image pipeline, calibrator and text scorer

use crate::error::{Result, WhiteMuseError};
use image::{DynamicImage, GenericImageView, GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Dense per-pixel foreground opacity grid
///
/// Every value lies in [0, 1]; the constructors clamp to uphold this. An
/// item without a mask is treated as fully opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Mask {
    /// Create a mask from row-major opacity values
    ///
    /// Values are clamped to [0, 1]; NaN becomes 0.
    ///
    /// # Errors
    /// - `data.len()` differs from `width * height`
    pub fn new(data: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(WhiteMuseError::processing(format!(
                "Mask data has {} values, expected {}x{} = {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        let data = data.into_iter().map(clamp_opacity).collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Create a mask with every pixel set to `value`
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![clamp_opacity(value); width as usize * height as usize],
        }
    }

    /// Create a mask by evaluating `f(x, y)` for every pixel
    #[must_use]
    pub fn from_fn<F: Fn(u32, u32) -> f32>(width: u32, height: u32, f: F) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(clamp_opacity(f(x, y)));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Mask width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mask dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major opacity values
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Opacity at (x, y); out-of-bounds reads as 0
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Whether the mask matches the given buffer dimensions
    #[must_use]
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Smallest box containing every pixel whose opacity exceeds `threshold`
    #[must_use]
    pub fn bounding_box(&self, threshold: f32) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        for (index, &value) in self.data.iter().enumerate() {
            if value <= threshold {
                continue;
            }
            let x = (index % self.width as usize) as u32;
            let y = (index / self.width as usize) as u32;
            bbox = Some(match bbox {
                None => BoundingBox {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(b) => BoundingBox {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                },
            });
        }
        bbox
    }

    /// Fraction of pixels with opacity above 0.5
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v > 0.5).count();
        foreground as f32 / self.data.len() as f32
    }

    /// Convert to an 8-bit grayscale image
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([(self.get(x, y) * 255.0).round() as u8])
        })
    }

    /// Save the mask as a grayscale PNG
    ///
    /// # Errors
    /// - Encoding or file write failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_gray_image()
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

fn clamp_opacity(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Inclusive pixel bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    /// Width in pixels, counting both edge columns
    #[must_use]
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Height in pixels, counting both edge rows
    #[must_use]
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// Image-space point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    #[must_use]
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Physical size derived from a mask bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub width_mm: f32,
    pub height_mm: f32,
    pub mm_per_px: f32,
}

impl SizeEstimate {
    #[must_use]
    pub fn width_cm(&self) -> f32 {
        self.width_mm / 10.0
    }

    #[must_use]
    pub fn height_cm(&self) -> f32 {
        self.height_mm / 10.0
    }
}

impl std::fmt::Display for SizeEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "W {:.1} mm x H {:.1} mm ({:.4} mm/px)",
            self.width_mm, self.height_mm, self.mm_per_px
        )
    }
}

/// Brand scored from recognized text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandCandidate {
    pub brand: String,
    pub hits: usize,
    pub score: f32,
}

/// Recognized text and the brands it points to
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    /// Only brands with hits > 0, sorted by descending score
    pub candidates: Vec<BrandCandidate>,
}

impl OcrResult {
    /// Highest-scoring candidate, if any
    #[must_use]
    pub fn top_candidate(&self) -> Option<&BrandCandidate> {
        self.candidates.first()
    }
}

/// Status attached to an item after each pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemStatus {
    /// Not processed yet
    #[default]
    Pending,
    /// Subject isolated and composited
    Isolated,
    /// Model unreachable; tone normalization only
    ModelUnavailable,
    /// Inference failed for this item; tone normalization only
    NoIsolation(String),
    /// Pipeline failed after segmentation
    Failed(String),
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Isolated => write!(f, "done"),
            Self::ModelUnavailable => write!(f, "done (model unavailable, no isolation)"),
            Self::NoIsolation(reason) => write!(f, "done (no isolation: {reason})"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Per-item stage timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model probe and session creation (first item only)
    pub model_load_ms: u64,
    /// Preprocessing, inference and mask smoothing
    pub segmentation_ms: u64,
    /// Tone normalization
    pub enhance_ms: u64,
    /// Shadow and white-background compositing
    pub composite_ms: u64,
    /// Total end-to-end time for the item
    pub total_ms: u64,
}

/// One photograph under processing
#[derive(Debug, Clone)]
pub struct Item {
    /// Unique identifier assigned on intake
    pub id: Uuid,
    /// Display name (usually the file name)
    pub name: String,
    source: DynamicImage,
    /// Working buffer, source downscaled to the working dimension
    pub before: RgbaImage,
    /// Pipeline output, same dimensions as `before`
    pub after: RgbaImage,
    pub mask: Option<Mask>,
    pub size: Option<SizeEstimate>,
    pub ocr: Option<OcrResult>,
    pub status: ItemStatus,
    /// Timings of the last pipeline run
    pub timings: ProcessingTimings,
}

impl Item {
    /// Create an item from a decoded image
    ///
    /// The working buffer is the source downscaled (never upscaled) so that
    /// its longest side is at most `max_dimension`.
    #[must_use]
    pub fn from_image<S: Into<String>>(name: S, source: DynamicImage, max_dimension: u32) -> Self {
        let before = working_buffer(&source, max_dimension);
        let after = before.clone();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source,
            before,
            after,
            mask: None,
            size: None,
            ocr: None,
            status: ItemStatus::Pending,
            timings: ProcessingTimings::default(),
        }
    }

    /// Decode encoded image bytes into a new item
    ///
    /// # Errors
    /// - Image decoding failures
    pub fn from_bytes<S: Into<String>>(name: S, bytes: &[u8], max_dimension: u32) -> Result<Self> {
        let source = crate::services::ImageIOService::decode(bytes)?;
        Ok(Self::from_image(name, source, max_dimension))
    }

    /// Immutable decoded source
    #[must_use]
    pub fn source(&self) -> &DynamicImage {
        &self.source
    }

    /// Working buffer dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.before.dimensions()
    }

    /// Encode the processed buffer for saving or sharing
    ///
    /// # Errors
    /// - Encoding failures
    pub fn encode_after(&self, format: crate::config::OutputFormat) -> Result<Vec<u8>> {
        crate::services::ImageIOService::encode(
            &self.after,
            format,
            crate::services::DEFAULT_JPEG_QUALITY,
        )
    }

    /// Clear results of a previous run before the pipeline mutates the item
    pub fn reset_results(&mut self) {
        self.after = self.before.clone();
        self.mask = None;
        self.size = None;
        self.status = ItemStatus::Pending;
        self.timings = ProcessingTimings::default();
    }
}

fn working_buffer(source: &DynamicImage, max_dimension: u32) -> RgbaImage {
    let (width, height) = source.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return source.to_rgba8();
    }
    let scale = max_dimension as f32 / longest as f32;
    let new_width = ((width as f32 * scale).round() as u32).max(1);
    let new_height = ((height as f32 * scale).round() as u32).max(1);
    source
        .resize_exact(new_width, new_height, image::imageops::FilterType::Triangle)
        .to_rgba8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_mask_clamps_values() {
        let mask = Mask::new(vec![-0.5, 0.25, 1.5, f32::NAN], 2, 2).unwrap();
        assert_eq!(mask.data(), &[0.0, 0.25, 1.0, 0.0]);
        assert!(mask.data().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_mask_rejects_wrong_length() {
        assert!(Mask::new(vec![0.0; 5], 2, 2).is_err());
    }

    #[test]
    fn test_bounding_box_inclusive() {
        let mask = Mask::from_fn(100, 100, |x, y| {
            if (10..60).contains(&x) && (5..85).contains(&y) {
                1.0
            } else {
                0.0
            }
        });
        let bbox = mask.bounding_box(0.5).unwrap();
        assert_eq!(bbox.min_x, 10);
        assert_eq!(bbox.max_x, 59);
        assert_eq!(bbox.width(), 50);
        assert_eq!(bbox.height(), 80);
    }

    #[test]
    fn test_bounding_box_empty() {
        let mask = Mask::filled(10, 10, 0.5);
        assert!(mask.bounding_box(0.5).is_none());
    }

    #[test]
    fn test_out_of_bounds_reads_zero() {
        let mask = Mask::filled(4, 4, 1.0);
        assert!((mask.get(3, 3) - 1.0).abs() < f32::EPSILON);
        assert!(mask.get(4, 0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_item_working_buffer_downscales() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 200, Rgba([9, 9, 9, 255])));
        let item = Item::from_image("wide.png", source, 100);
        assert_eq!(item.dimensions(), (100, 50));
        assert_eq!(item.source().dimensions(), (400, 200));
        assert_eq!(item.after.dimensions(), (100, 50));
        assert_eq!(item.status, ItemStatus::Pending);
    }

    #[test]
    fn test_item_never_upscales() {
        let source = DynamicImage::ImageRgba8(RgbaImage::new(30, 20));
        let item = Item::from_image("small.png", source, 1600);
        assert_eq!(item.dimensions(), (30, 20));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ItemStatus::Isolated.to_string(), "done");
        assert!(ItemStatus::NoIsolation("boom".into())
            .to_string()
            .contains("boom"));
    }
}
