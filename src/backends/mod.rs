//! Inference backends for the saliency model
//!
//! - ONNX Runtime backend (GPU execution providers when available)
//! - Tract backend (pure Rust, no native runtime)

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
