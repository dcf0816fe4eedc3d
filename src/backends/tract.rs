//! Tract backend for the saliency model
//!
//! Pure Rust inference with no native runtime to install. CPU only.

use crate::config::PipelineConfig;
use crate::error::{Result, WhiteMuseError};
use crate::inference::InferenceBackend;
use crate::utils::MODEL_INPUT_SIZE;
use log;
use ndarray::Array4;
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

use instant::{Duration, Instant};

/// Tract backend
#[derive(Debug, Default)]
pub struct TractBackend {
    model: Option<TractModel>,
    initialized: bool,
}

impl TractBackend {
    /// Tract runs on the CPU only
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create an uninitialized backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn load_model(&mut self, model: &[u8]) -> Result<Duration> {
        let model_load_start = Instant::now();

        log::info!("🚀 Initializing Tract backend");
        log::info!(
            "📏 Model size: {:.2} MB",
            model.len() as f64 / (1024.0 * 1024.0)
        );

        let size = MODEL_INPUT_SIZE as usize;
        let runnable = onnx()
            .model_for_read(&mut std::io::Cursor::new(model))
            .map_err(|e| WhiteMuseError::inference(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .map_err(|e| WhiteMuseError::inference(format!("Failed to pin input shape: {e}")))?
            .into_optimized()
            .map_err(|e| WhiteMuseError::inference(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                WhiteMuseError::inference(format!("Failed to create runnable model: {e}"))
            })?;

        self.model = Some(runnable);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &PipelineConfig, model: &[u8]) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.load_model(model).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| WhiteMuseError::internal("Tract model not initialized"))?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let outputs = model
            .run(tvec![Tensor::from(input.clone()).into()])
            .map_err(|e| WhiteMuseError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| WhiteMuseError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            WhiteMuseError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let output_shape = output_data.shape();
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
            output_data.to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| WhiteMuseError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "✅ Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
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
