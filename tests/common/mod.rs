//! Shared fixtures for integration tests
//!
//! The library's own mock backend lives behind `cfg(test)`, so integration
//! tests carry a small backend of their own.

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use instant::Duration;
use ndarray::Array4;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tempfile::TempDir;
use whitemuse::{
    config::{ModelLocation, PipelineConfig},
    error::{Result, WhiteMuseError},
    inference::InferenceBackend,
    services::{BatchProcessingStats, ProcessingStage, ProgressReporter, ProgressUpdate},
    types::ProcessingTimings,
};

pub const GRID: usize = 320;

/// Backend returning a rectangular subject over the central half of the frame
///
/// Calls listed in `fail_on` (zero-based inference count) return an error.
#[derive(Debug, Default)]
pub struct RectangleBackend {
    initialized: bool,
    calls: usize,
    fail_on: Vec<usize>,
}

impl RectangleBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.to_vec(),
            ..Self::default()
        }
    }
}

impl InferenceBackend for RectangleBackend {
    fn initialize(&mut self, _config: &PipelineConfig, model: &[u8]) -> Result<Option<Duration>> {
        if model.is_empty() {
            return Err(WhiteMuseError::inference("empty model artifact"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(3)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on.contains(&call) {
            return Err(WhiteMuseError::inference(format!("scripted failure on call {call}")));
        }
        assert_eq!(input.shape(), &[1, 3, GRID, GRID]);

        let lo = GRID / 4;
        let hi = GRID - GRID / 4;
        Ok(Array4::from_shape_fn((1, 1, GRID, GRID), |(_, _, y, x)| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                6.0
            } else {
                -6.0
            }
        }))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, GRID, GRID)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, GRID, GRID)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Reporter recording every batch update
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    pub batches: Arc<Mutex<Vec<BatchProcessingStats>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl ProgressReporter for RecordingReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.errors
            .lock()
            .unwrap()
            .push(format!("{}: {error}", stage.description()));
    }

    fn report_batch_progress(&self, stats: BatchProcessingStats) {
        self.batches.lock().unwrap().push(stats);
    }
}

/// Temporary directory holding a non-empty model artifact
pub fn model_file() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("silueta.onnx");
    std::fs::write(&path, b"synthetic model bytes").unwrap();
    (dir, path)
}

pub fn config_for(path: PathBuf) -> PipelineConfig {
    PipelineConfig::builder()
        .model(ModelLocation::Local(path))
        .build()
        .unwrap()
}

pub fn missing_model_config() -> PipelineConfig {
    config_for(PathBuf::from("/nonexistent/whitemuse/silueta.onnx"))
}

/// Warm-tinted product shot: a darker box on an off-white table
pub fn product_photo(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let in_subject = x >= width / 4 && x < width * 3 / 4 && y >= height / 4 && y < height * 3 / 4;
        if in_subject {
            Rgba([120, 80, 60, 255])
        } else {
            Rgba([230, 220, 200, 255])
        }
    })
}
