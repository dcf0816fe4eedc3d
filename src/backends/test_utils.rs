//! Mock inference backend for tests
//!
//! Produces synthetic saliency maps so segmentation and pipeline tests run
//! without a model file or a native runtime.

use crate::{
    config::PipelineConfig,
    error::{Result, WhiteMuseError},
    inference::InferenceBackend,
    utils::MODEL_INPUT_SIZE,
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Shape of the saliency map the mock returns
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockOutput {
    /// Soft disc centred in the frame
    CenteredBlob,
    /// Every cell holds the same value
    Flat(f32),
    /// Raw logits far outside [0, 1] with a rectangular subject
    Logits,
}

/// Mock backend with configurable failure modes and call recording
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    output: MockOutput,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_output(MockOutput::CenteredBlob)
    }

    #[must_use]
    pub fn with_output(output: MockOutput) -> Self {
        Self {
            initialized: false,
            output,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::new();
        backend.should_fail_inference = true;
        backend
    }

    /// Shared handle on the call history, valid after the mock is boxed
    #[must_use]
    pub fn history_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn generate_output(&self) -> Array4<f32> {
        let size = MODEL_INPUT_SIZE as usize;
        let center = size as f32 / 2.0;
        let radius = size as f32 / 3.0;
        let margin = size / 4;

        Array4::from_shape_fn((1, 1, size, size), |(_, _, y, x)| match self.output {
            MockOutput::Flat(value) => value,
            MockOutput::CenteredBlob => {
                let dx = x as f32 - center;
                let dy = y as f32 - center;
                let distance = (dx * dx + dy * dy).sqrt();
                ((radius - distance) / radius).clamp(0.0, 1.0)
            },
            MockOutput::Logits => {
                let inside = (margin..size - margin).contains(&x) && (margin..size - margin).contains(&y);
                if inside {
                    8.0
                } else {
                    -6.0
                }
            },
        })
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &PipelineConfig, _model: &[u8]) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.should_fail_init {
            return Err(WhiteMuseError::inference("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(150)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(WhiteMuseError::internal("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(WhiteMuseError::inference("Mock backend inference failed"));
        }
        if input.dim() != self.input_shape() {
            return Err(WhiteMuseError::inference(format!(
                "Unexpected input shape {:?}",
                input.dim()
            )));
        }

        Ok(self.generate_output())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mut backend = MockBackend::new();
        backend.initialize(&PipelineConfig::default(), &[]).unwrap();
        let input = Array4::zeros(backend.input_shape());
        backend.infer(&input).unwrap();

        assert_eq!(backend.get_call_history(), vec!["initialize", "infer"]);
    }

    #[test]
    fn test_failure_modes() {
        let mut failing_init = MockBackend::new_failing_init();
        assert!(failing_init
            .initialize(&PipelineConfig::default(), &[])
            .is_err());

        let mut failing_infer = MockBackend::new_failing_inference();
        failing_infer
            .initialize(&PipelineConfig::default(), &[])
            .unwrap();
        let input = Array4::zeros(failing_infer.input_shape());
        assert!(matches!(
            failing_infer.infer(&input),
            Err(WhiteMuseError::Inference(_))
        ));
    }

    #[test]
    fn test_blob_is_brightest_at_center() {
        let mut backend = MockBackend::new();
        backend.initialize(&PipelineConfig::default(), &[]).unwrap();
        let output = backend.infer(&Array4::zeros((1, 3, 320, 320))).unwrap();

        assert!(output[[0, 0, 160, 160]] > 0.9);
        assert!(output[[0, 0, 0, 0]].abs() < f32::EPSILON);
    }
}
