//! Tone normalization
//!
//! Mask-aware white balance, percentile exposure stretch, exposure/contrast,
//! saturation and unsharp masking. Pixels whose mask opacity exceeds
//! [`SAMPLE_OPACITY`] drive the statistics; without a mask (or with too few
//! qualifying pixels) the whole buffer is sampled.

use crate::{
    config::EnhanceOptions,
    error::{Result, WhiteMuseError},
    types::Mask,
};
use image::{Rgba, RgbaImage};
use log::debug;

/// Minimum opacity for a pixel to count as subject when sampling statistics
pub const SAMPLE_OPACITY: f32 = 0.25;

/// Fewer qualifying pixels than this falls back to the whole buffer
pub const MIN_SAMPLE_PIXELS: usize = 50;

/// Background weight above which pixels are pushed toward white
pub const WHITEN_THRESHOLD: f32 = 0.7;

/// Blend factor toward pure white for background pixels
pub const WHITEN_BLEND: f32 = 0.65;

const LOW_PERCENTILE: f32 = 0.02;
const HIGH_PERCENTILE: f32 = 0.98;
const MID_GRAY: f32 = 128.0;

/// ITU-R BT.709 luma weights
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Per-channel white-balance gains and the sampled means they were derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhiteBalance {
    pub means: [f32; 3],
    pub gains: [f32; 3],
}

impl WhiteBalance {
    /// Apply the gains to one RGB triple
    #[must_use]
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        [
            rgb[0] * self.gains[0],
            rgb[1] * self.gains[1],
            rgb[2] * self.gains[2],
        ]
    }
}

/// Inclusive histogram range used for the exposure stretch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneRange {
    pub lo: u8,
    pub hi: u8,
}

impl ToneRange {
    /// Stretch divisor; a degenerate range uses 1
    #[must_use]
    pub fn span(&self) -> f32 {
        if self.hi > self.lo {
            f32::from(self.hi - self.lo)
        } else {
            1.0
        }
    }

    #[must_use]
    pub fn stretch(&self, value: f32) -> f32 {
        (value - f32::from(self.lo)) / self.span() * 255.0
    }
}

/// Normalize tone and color of `image`
///
/// The alpha channel of the input is carried through untouched.
///
/// # Errors
/// - Mask dimensions differ from the image dimensions
pub fn enhance(image: &RgbaImage, mask: Option<&Mask>, options: &EnhanceOptions) -> Result<RgbaImage> {
    check_mask(image, mask)?;

    let samples = sample_indices(image, mask);
    let balance = estimate_white_balance(image, &samples);
    let range = percentile_range(image, &samples, &balance);
    debug!(
        "Tone statistics: gains={:?} range={}..{} samples={}",
        balance.gains,
        range.lo,
        range.hi,
        samples.len()
    );

    let exposure = options.exposure_gain();
    let contrast = options.contrast_gain();
    let boost = options.saturation_boost();
    let desaturate = options.denoise_desaturation();
    let (width, height) = image.dimensions();

    let mut toned: Vec<[f32; 3]> = Vec::with_capacity(width as usize * height as usize);
    for (x, y, pixel) in image.enumerate_pixels() {
        let balanced = balance.apply(rgb_of(pixel));
        let mut rgb = balanced.map(|c| {
            let stretched = range.stretch(c) * exposure;
            ((stretched - MID_GRAY) * contrast + MID_GRAY).clamp(0.0, 255.0)
        });

        let luma = luma_of(rgb);
        rgb = rgb.map(|c| luma + (c - luma) * (1.0 + boost));
        rgb = rgb.map(|c| (c + (luma - c) * desaturate).clamp(0.0, 255.0));

        if let Some(mask) = mask {
            if 1.0 - mask.get(x, y) > WHITEN_THRESHOLD {
                rgb = rgb.map(|c| c + (255.0 - c) * WHITEN_BLEND);
            }
        }
        toned.push(rgb);
    }

    let amount = options.sharpen_amount();
    let mut output = RgbaImage::new(width, height);
    for (x, y, out) in output.enumerate_pixels_mut() {
        let index = y as usize * width as usize + x as usize;
        let center = toned.get(index).copied().unwrap_or([0.0; 3]);
        let low = box3(&toned, width, height, x, y);
        let alpha = image.get_pixel(x, y)[3];
        let channel = |i: usize| {
            let c = center[i] + amount * (center[i] - low[i]);
            c.clamp(0.0, 255.0).round() as u8
        };
        *out = Rgba([channel(0), channel(1), channel(2), alpha]);
    }
    Ok(output)
}

/// Indices of pixels that drive the color statistics
#[must_use]
pub fn sample_indices(image: &RgbaImage, mask: Option<&Mask>) -> Vec<usize> {
    let total = image.width() as usize * image.height() as usize;
    if let Some(mask) = mask {
        let qualified: Vec<usize> = mask
            .data()
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > SAMPLE_OPACITY)
            .map(|(i, _)| i)
            .take(total)
            .collect();
        if qualified.len() >= MIN_SAMPLE_PIXELS {
            return qualified;
        }
    }
    (0..total).collect()
}

/// Gains that equalize the sampled channel means to their grand mean
#[must_use]
pub fn estimate_white_balance(image: &RgbaImage, samples: &[usize]) -> WhiteBalance {
    let raw = image.as_raw();
    let mut sums = [0.0f64; 3];
    let mut count = 0usize;
    for &index in samples {
        if let Some(px) = raw.get(index * 4..index * 4 + 3) {
            for (sum, &c) in sums.iter_mut().zip(px) {
                *sum += f64::from(c);
            }
            count += 1;
        }
    }
    if count == 0 {
        return WhiteBalance {
            means: [0.0; 3],
            gains: [1.0; 3],
        };
    }

    let means = sums.map(|s| (s / count as f64) as f32);
    let grand = (means[0] + means[1] + means[2]) / 3.0;
    let gains = means.map(|m| if m > f32::EPSILON { grand / m } else { 1.0 });
    WhiteBalance { means, gains }
}

/// 2nd and 98th percentile bins of the white-balanced luma histogram
#[must_use]
pub fn percentile_range(image: &RgbaImage, samples: &[usize], balance: &WhiteBalance) -> ToneRange {
    let histogram = luma_histogram(image, samples, balance);
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return ToneRange { lo: 0, hi: 255 };
    }

    let low_target = (total as f64 * f64::from(LOW_PERCENTILE)).ceil().max(1.0) as u64;
    let high_target = (total as f64 * f64::from(HIGH_PERCENTILE)).ceil().max(1.0) as u64;
    let mut cumulative = 0u64;
    let mut lo = None;
    let mut hi = 255u8;
    for (bin, &count) in histogram.iter().enumerate() {
        cumulative += count;
        if lo.is_none() && cumulative >= low_target {
            lo = Some(bin as u8);
        }
        if cumulative >= high_target {
            hi = bin as u8;
            break;
        }
    }
    let lo = lo.unwrap_or(0);
    ToneRange { lo, hi: hi.max(lo) }
}

/// 256-bin histogram of `floor(luma)` after white balance
#[must_use]
pub fn luma_histogram(image: &RgbaImage, samples: &[usize], balance: &WhiteBalance) -> [u64; 256] {
    let raw = image.as_raw();
    let mut histogram = [0u64; 256];
    for &index in samples {
        if let Some(px) = raw.get(index * 4..index * 4 + 3) {
            let rgb = balance.apply([f32::from(px[0]), f32::from(px[1]), f32::from(px[2])]);
            let bin = luma_of(rgb).floor().clamp(0.0, 255.0) as usize;
            if let Some(slot) = histogram.get_mut(bin) {
                *slot += 1;
            }
        }
    }
    histogram
}

fn check_mask(image: &RgbaImage, mask: Option<&Mask>) -> Result<()> {
    match mask {
        Some(mask) if !mask.matches(image.width(), image.height()) => {
            Err(WhiteMuseError::processing_stage_error(
                "enhance",
                "mask dimensions differ from buffer",
                Some(&format!(
                    "buffer {}x{}, mask {}x{}",
                    image.width(),
                    image.height(),
                    mask.width(),
                    mask.height()
                )),
            ))
        },
        _ => Ok(()),
    }
}

fn rgb_of(pixel: &Rgba<u8>) -> [f32; 3] {
    [
        f32::from(pixel[0]),
        f32::from(pixel[1]),
        f32::from(pixel[2]),
    ]
}

fn luma_of(rgb: [f32; 3]) -> f32 {
    LUMA[0] * rgb[0] + LUMA[1] * rgb[1] + LUMA[2] * rgb[2]
}

/// 3×3 mean with edge clamping
fn box3(values: &[[f32; 3]], width: u32, height: u32, x: u32, y: u32) -> [f32; 3] {
    let mut sum = [0.0f32; 3];
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            let sx = (i64::from(x) + dx).clamp(0, i64::from(width) - 1) as usize;
            let sy = (i64::from(y) + dy).clamp(0, i64::from(height) - 1) as usize;
            let v = values
                .get(sy * width as usize + sx)
                .copied()
                .unwrap_or([0.0; 3]);
            for (s, c) in sum.iter_mut().zip(v) {
                *s += c;
            }
        }
    }
    sum.map(|s| s / 9.0)
}
