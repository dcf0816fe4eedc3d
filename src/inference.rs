//! Inference backend abstraction and backend construction

use crate::{
    config::{BackendType, PipelineConfig},
    error::{Result, WhiteMuseError},
};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for saliency inference backends
///
/// A backend is created empty, initialized once from the model bytes and then
/// reused for every item of the session.
pub trait InferenceBackend: Send {
    /// Build the inference session from the model artifact bytes
    ///
    /// Returns the load time on the first call and `None` once initialized.
    ///
    /// # Errors
    /// - Model bytes that the runtime cannot parse
    /// - Session construction failures
    fn initialize(&mut self, config: &PipelineConfig, model: &[u8]) -> Result<Option<Duration>>;

    /// Run inference on a `[1, 3, H, W]` tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Runtime failures or an output that is not 4D
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Expected input shape
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Expected output shape
    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}

/// Creates inference backends for a requested engine
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(&self, backend_type: BackendType) -> Result<Box<dyn InferenceBackend>>;

    /// Backend types this factory can build
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Factory for the backends enabled by cargo features
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(&self, backend_type: BackendType) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new())),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new())),
            #[allow(unreachable_patterns)]
            other => Err(WhiteMuseError::unavailable(format!(
                "{other:?} backend not compiled into this build"
            ))),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}
