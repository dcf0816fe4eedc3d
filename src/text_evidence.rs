//! Brand evidence from recognized on-image text
//!
//! Recognition itself is delegated to a [`TextRecognizer`]; this module
//! prepares the region it reads, scores the returned text against a brand
//! keyword dictionary and decides whether to suggest a retake.

use crate::{
    config::OutputFormat,
    error::Result,
    services::{ImageIOService, DEFAULT_JPEG_QUALITY},
    types::{BrandCandidate, OcrResult},
};
use async_trait::async_trait;
use image::RgbaImage;
use log::debug;

/// Score never reaches certainty
pub const MAX_SCORE: f32 = 0.99;

/// Minimum keyword-list length used as the score denominator
const MIN_SCORE_DENOMINATOR: usize = 4;

/// Recognized text shorter than this (whitespace removed) suggests a retake
pub const MIN_TEXT_CHARS: usize = 8;

/// Fraction of each side kept for the recognition crop
pub const OCR_CROP_FRACTION: f32 = 0.8;

/// Brand → keywords. Keywords are lowercase; matching is substring-based.
pub const BRAND_KEYWORDS: &[(&str, &[&str])] = &[
    ("CHANEL", &["chanel", "paris", "coco", "matelasse", "シャネル"]),
    (
        "LOUIS VUITTON",
        &["louis vuitton", "vuitton", "monogram", "damier", "ルイヴィトン"],
    ),
    ("HERMES", &["hermes", "hermès", "birkin", "kelly", "エルメス"]),
    ("GUCCI", &["gucci", "firenze", "marmont", "グッチ"]),
    ("PRADA", &["prada", "milano", "saffiano", "プラダ"]),
    ("ROLEX", &["rolex", "oyster", "perpetual", "geneve", "ロレックス"]),
];

const RETAKE_GUIDANCE: &str = "Not enough text was recognized.\n\
- Move closer so the logo or tag fills the frame\n\
- Avoid glare and shoot under even light\n\
- Hold the camera parallel to the printed surface";

/// Score recognized text against the brand dictionary
///
/// Only brands with at least one keyword hit are returned, sorted by
/// descending score.
#[must_use]
pub fn score(text: &str) -> Vec<BrandCandidate> {
    score_with(text, BRAND_KEYWORDS)
}

/// Score against a caller-supplied dictionary
#[must_use]
pub fn score_with(text: &str, dictionary: &[(&str, &[&str])]) -> Vec<BrandCandidate> {
    let haystack = text.to_lowercase();
    if haystack.trim().is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<BrandCandidate> = dictionary
        .iter()
        .filter_map(|(brand, keywords)| {
            let hits = keywords
                .iter()
                .filter(|keyword| haystack.contains(&keyword.to_lowercase()))
                .count();
            (hits > 0).then(|| BrandCandidate {
                brand: (*brand).to_string(),
                hits,
                score: (hits as f32 / keywords.len().max(MIN_SCORE_DENOMINATOR) as f32)
                    .min(MAX_SCORE),
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

/// Guidance to retake the photo when too little text was recognized
#[must_use]
pub fn retake_guidance(text: &str) -> Option<&'static str> {
    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    (chars < MIN_TEXT_CHARS).then_some(RETAKE_GUIDANCE)
}

/// Central 80%×80% region of the processed image
#[must_use]
pub fn ocr_region(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let crop_w = ((width as f32 * OCR_CROP_FRACTION).round() as u32).clamp(1, width.max(1));
    let crop_h = ((height as f32 * OCR_CROP_FRACTION).round() as u32).clamp(1, height.max(1));
    let x = (width.saturating_sub(crop_w)) / 2;
    let y = (height.saturating_sub(crop_h)) / 2;
    image::imageops::crop_imm(image, x, y, crop_w, crop_h).to_image()
}

/// PNG-encoded recognition region
///
/// # Errors
/// - Encoding failures
pub fn encode_ocr_region(image: &RgbaImage) -> Result<Vec<u8>> {
    ImageIOService::encode(&ocr_region(image), OutputFormat::Png, DEFAULT_JPEG_QUALITY)
}

/// Progress reported by a recognizer while it works
#[derive(Debug, Clone, PartialEq)]
pub struct OcrProgress {
    /// Engine status label
    pub status: String,
    /// Fraction complete in [0, 1]
    pub progress: f32,
}

/// Optical character recognition engine
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize text in a PNG-encoded image
    ///
    /// # Errors
    /// - `Unavailable` when the engine cannot be loaded
    async fn recognize(
        &self,
        png: &[u8],
        progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> Result<String>;
}

/// Recognize and score the text in the central region of `image`
///
/// # Errors
/// - Encoding failures or recognizer errors
pub async fn recognize_text(
    recognizer: &dyn TextRecognizer,
    image: &RgbaImage,
    progress: &(dyn Fn(OcrProgress) + Send + Sync),
) -> Result<OcrResult> {
    let png = encode_ocr_region(image)?;
    let text = recognizer.recognize(&png, progress).await?;
    let candidates = score(&text);
    debug!(
        "Recognized {} chars, {} brand candidates",
        text.chars().count(),
        candidates.len()
    );
    Ok(OcrResult { text, candidates })
}
