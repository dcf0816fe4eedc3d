//! ONNX Runtime backend for the saliency model
//!
//! Builds one ONNX Runtime session from the model bytes and reuses it for every
//! item. Hardware execution providers (CUDA, `CoreML`) are used when requested
//! and available, with CPU as the fallback.

use crate::config::{ExecutionProvider, PipelineConfig};
use crate::error::{Result, WhiteMuseError};
use crate::inference::InferenceBackend;
use crate::utils::MODEL_INPUT_SIZE;
use log;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{self, value::Value};

use instant::{Duration, Instant};

/// ONNX Runtime backend
#[derive(Debug, Default)]
pub struct OnnxBackend {
    session: Option<Session>,
    initialized: bool,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability status and descriptions
    ///
    /// # Examples
    /// ```rust,no_run
    /// use whitemuse::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{name}: {available} - {description}");
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 System Hardware Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available(),
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available(),
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create an uninitialized backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Execution providers for the requested configuration, best first
    fn providers_for(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let mut providers = Vec::new();
        let want_cuda = matches!(requested, ExecutionProvider::Auto | ExecutionProvider::Cuda);
        let want_coreml = matches!(requested, ExecutionProvider::Auto | ExecutionProvider::CoreMl);

        if want_cuda {
            if cuda_available() {
                log::info!("🚀 CUDA execution provider is available and will be used");
                providers.push(CUDAExecutionProvider::default().build());
            } else if requested == ExecutionProvider::Cuda {
                log::warn!("CUDA execution provider requested but not available, falling back to CPU");
            }
        }

        if want_coreml {
            if coreml_available() {
                log::info!("🍎 CoreML execution provider is available and will be used");
                providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
            } else if requested == ExecutionProvider::CoreMl {
                log::warn!("CoreML execution provider requested but not available, falling back to CPU");
            }
        }

        if providers.is_empty() {
            log::info!("Using CPU execution provider");
        }
        providers
    }

    fn load_model(&mut self, config: &PipelineConfig, model: &[u8]) -> Result<Duration> {
        let model_load_start = Instant::now();

        let mut session_builder = Session::builder()
            .map_err(|e| WhiteMuseError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| WhiteMuseError::inference(format!("Failed to set optimization level: {e}")))?;

        let providers = Self::providers_for(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    WhiteMuseError::inference(format!("Failed to set execution providers: {e}"))
                })?;
        }

        let parallelism = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(4);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            parallelism
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (parallelism / 4).max(1)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| WhiteMuseError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| WhiteMuseError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(model)
            .map_err(|e| {
                WhiteMuseError::inference(format!("Failed to create session from model data: {e}"))
            })?;

        log::debug!("✅ ONNX Runtime session created");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!("  - Threading: {intra_threads} intra-op, {inter_threads} inter-op");
        log::debug!(
            "  - Model size: {:.2} MB",
            model.len() as f64 / (1024.0 * 1024.0)
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );
        Ok(model_load_time)
    }
}

fn cuda_available() -> bool {
    OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
}

fn coreml_available() -> bool {
    OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &PipelineConfig, model: &[u8]) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.load_model(config, model).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(WhiteMuseError::internal("Backend not initialized"));
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| WhiteMuseError::internal("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| WhiteMuseError::inference(format!("Failed to convert input tensor: {e}")))?;

        // Positional inputs and outputs keep the backend independent of tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| WhiteMuseError::inference(format!("ONNX inference failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| WhiteMuseError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| WhiteMuseError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| WhiteMuseError::inference(format!("Failed to extract output tensor: {e}")))?;

        let output_shape = output_tensor.shape().to_vec();
        if output_shape.len() != 4 {
            return Err(WhiteMuseError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_array = Array4::from_shape_vec(
            (
                output_shape.first().copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(1),
                output_shape.get(3).copied().unwrap_or(1),
            ),
            output_tensor.view().to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| WhiteMuseError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::info!(
            "📊 Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(output_array)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, MODEL_INPUT_SIZE as usize, MODEL_INPUT_SIZE as usize)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, MODEL_INPUT_SIZE as usize, MODEL_INPUT_SIZE as usize)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
