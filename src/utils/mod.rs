//! Shared pixel and tensor helpers
//!
//! - `preprocessing`: model input tensors and saliency-to-mask conversion
//! - `blur`: separable box blur used by segmentation and the compositor

pub mod blur;
pub mod preprocessing;

pub use blur::{blur_mask, box_blur, MASK_SMOOTH_RADIUS, SHADOW_SOFTEN_RADIUS};
pub use preprocessing::{ImagePreprocessor, MODEL_INPUT_SIZE};
