#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # WhiteMuse
//!
//! On-device product photo studio. Each photograph goes through subject
//! isolation, tone normalization and compositing onto a white background
//! with a soft contact shadow. A two-tap calibration turns the subject mask
//! into a physical size estimate. Recognized label text is scored against
//! brand keywords, and listing copy adapts to what the seller actually uses
//! and sells.
//!
//! ## Features
//!
//! - **Graceful degradation**: a missing or broken segmentation model never
//!   fails a batch; items fall back to tone normalization only
//! - **Multiple Backends**: ONNX Runtime (GPU acceleration) and Tract (Pure Rust)
//! - **Sticky session style**: strength and forced variants persist across items
//! - **Calibration**: ID-1 card, A4 paper (either edge) or 100 mm ruler references for size estimates
//! - **Adaptive copy**: persisted learning profile biased by usage and sales
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whitemuse::{PipelineConfig, Studio};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::builder().strength(0.7).build()?;
//! let mut studio = Studio::new(config)?;
//! studio.add_file("sneaker.jpg")?;
//!
//! let stats = studio.process_all().await;
//! println!("{}/{} items done", stats.items_completed, stats.items_total);
//!
//! if let Some(item) = studio.item(0) {
//!     std::fs::write("sneaker_white.png", item.encode_after(whitemuse::OutputFormat::Png)?)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract`: Pure Rust backend
//! - `cli` (default): Command-line interface and progress reporting
//! - `tracing-json`: JSON log output for the CLI
//! - `webp-support`: WebP input decoding
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! whitemuse = { version = "0.1", default-features = false, features = ["onnx"] }
//! ```

pub mod backends;
pub mod calibration;
#[cfg(feature = "cli")]
pub mod cli;
pub mod composite;
pub mod config;
pub mod copy;
pub mod enhance;
pub mod error;
pub mod inference;
pub mod model_probe;
pub mod processor;
pub mod segmentation;
pub mod services;
pub mod text_evidence;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::*;
pub use calibration::{CalibrationState, Calibrator, DisplayRect, ReferenceObject, TapOutcome};
pub use config::{
    BackendType, EnhanceOptions, ExecutionProvider, ModelLocation, OutputFormat, PipelineConfig,
    PipelineConfigBuilder, Variant,
};
pub use copy::{
    CopyContext, CopyEngine, CopyMode, FileProfileStore, GeneratedCopy, LearningProfile,
    MemoryProfileStore, ProfileService, ProfileStore, Tone,
};
pub use error::{Result, WhiteMuseError};
pub use inference::{BackendFactory, DefaultBackendFactory, InferenceBackend};
pub use model_probe::ModelProbe;
pub use processor::Studio;
pub use segmentation::{Capability, SegmentationAdapter};
pub use services::{
    BatchProcessingStats, ConsoleProgressReporter, ImageIOService, NoOpProgressReporter,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use text_evidence::{OcrProgress, TextRecognizer};
pub use types::{
    BoundingBox, BrandCandidate, Item, ItemStatus, Mask, OcrResult, Point, ProcessingTimings,
    SizeEstimate,
};
pub use utils::{box_blur, ImagePreprocessor};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Process a single encoded photograph with a one-off session
///
/// Convenience wrapper around [`Studio`] for callers that do not need a
/// session style or calibration. The returned item carries the processed
/// buffer, the mask when isolation succeeded, and its status.
///
/// # Errors
/// - Invalid configuration
/// - Image decoding failures
pub async fn process_image_bytes(
    name: &str,
    bytes: &[u8],
    config: &PipelineConfig,
) -> Result<Item> {
    let mut studio = Studio::new(config.clone())?;
    let index = studio.add_bytes(name, bytes)?;
    studio.process_item(index).await?;
    studio
        .into_items()
        .into_iter()
        .next()
        .ok_or_else(|| WhiteMuseError::internal("processed item vanished from the session"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_process_image_bytes_rejects_garbage() {
        let config = PipelineConfig::default();
        let result = process_image_bytes("junk.bin", b"not an image", &config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_process_image_bytes_without_model() {
        let image = image::RgbaImage::from_pixel(24, 16, image::Rgba([180, 170, 160, 255]));
        let bytes =
            ImageIOService::encode(&image, OutputFormat::Png, services::DEFAULT_JPEG_QUALITY)
                .unwrap();
        let config = PipelineConfig::builder()
            .model(ModelLocation::Local("/nonexistent/whitemuse/model.onnx".into()))
            .build()
            .unwrap();

        let item = process_image_bytes("flat.png", &bytes, &config).await.unwrap();
        assert_eq!(item.status, ItemStatus::ModelUnavailable);
        assert!(item.mask.is_none());
        assert_eq!(item.after.dimensions(), (24, 16));
    }
}
