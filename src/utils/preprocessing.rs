//! Tensor conversion around the saliency model
//!
//! The model consumes a fixed square grid and produces a single-channel
//! saliency grid of the same extent. These helpers build the input tensor
//! from a working buffer and map the output back to a full-size mask.

use crate::{
    error::{Result, WhiteMuseError},
    types::Mask,
};
use image::RgbaImage;
use ndarray::Array4;

/// Side length of the square model input
pub const MODEL_INPUT_SIZE: u32 = 320;

/// Output ranges below this are treated as flat
const FLAT_RANGE_EPSILON: f32 = 1e-6;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Resample the buffer to `size`×`size` and build a planar NCHW tensor
    ///
    /// Channels are scaled to [0, 1] without mean/std normalization; the
    /// aspect ratio is not preserved.
    ///
    /// # Errors
    /// - Empty input buffer or zero target size
    pub fn preprocess_for_inference(image: &RgbaImage, size: u32) -> Result<Array4<f32>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || size == 0 {
            return Err(WhiteMuseError::processing_stage_error(
                "preprocessing",
                "empty image or target size",
                Some(&format!("{}x{} -> {}", width, height, size)),
            ));
        }

        let resized = image::imageops::resize(
            image,
            size,
            size,
            image::imageops::FilterType::Triangle,
        );

        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match the resized buffer
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = f32::from(pixel[0]) / 255.0;
            tensor[[0, 1, y, x]] = f32::from(pixel[1]) / 255.0;
            tensor[[0, 2, y, x]] = f32::from(pixel[2]) / 255.0;
        }

        Ok(tensor)
    }

    /// Convert a saliency output tensor into a mask of the given dimensions
    ///
    /// The output is min-max normalized using its own observed range, then
    /// upsampled with nearest-neighbour index mapping. A flat output yields an
    /// all-zero mask.
    ///
    /// # Errors
    /// - Output tensor is not shaped `[1, 1, H, W]` or is empty
    pub fn tensor_to_mask(tensor: &Array4<f32>, dimensions: (u32, u32)) -> Result<Mask> {
        Self::validate_tensor_shape(tensor)?;
        let shape = tensor.shape();
        let grid_height = shape.get(2).copied().unwrap_or(0);
        let grid_width = shape.get(3).copied().unwrap_or(0);

        let (min, max) = tensor
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        let (width, height) = dimensions;
        if !range.is_finite() || range < FLAT_RANGE_EPSILON {
            return Ok(Mask::filled(width, height, 0.0));
        }

        let scale_x = grid_width as f32 / width.max(1) as f32;
        let scale_y = grid_height as f32 / height.max(1) as f32;

        Ok(Mask::from_fn(width, height, |x, y| {
            let grid_x = ((x as f32 * scale_x) as usize).min(grid_width - 1);
            let grid_y = ((y as f32 * scale_y) as usize).min(grid_height - 1);
            tensor
                .get([0, 0, grid_y, grid_x])
                .map_or(0.0, |&value| (value - min) / range)
        }))
    }

    /// Validate tensor shape for mask generation
    #[allow(clippy::get_first)]
    fn validate_tensor_shape(tensor: &Array4<f32>) -> Result<()> {
        let shape = tensor.shape();
        if shape.get(0).copied().unwrap_or(0) != 1
            || shape.get(1).copied().unwrap_or(0) != 1
            || shape.get(2).copied().unwrap_or(0) == 0
            || shape.get(3).copied().unwrap_or(0) == 0
        {
            return Err(WhiteMuseError::inference(format!(
                "Invalid output tensor shape {:?}, expected [1, 1, H, W]",
                shape
            )));
        }
        Ok(())
    }
}
