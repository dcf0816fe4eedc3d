//! Segmentation adapter
//!
//! Turns a working buffer into a foreground mask with the saliency model. The
//! first call probes the model artifact; an unreachable model leaves the
//! adapter [`Capability::Unavailable`] for the rest of the session and every
//! later call returns `Ok(None)`. A reachable model is loaded into one backend
//! session that all later calls reuse.

use crate::{
    config::PipelineConfig,
    error::{Result, WhiteMuseError},
    inference::{BackendFactory, DefaultBackendFactory, InferenceBackend},
    model_probe::ModelProbe,
    types::Mask,
    utils::{blur_mask, ImagePreprocessor, MASK_SMOOTH_RADIUS, MODEL_INPUT_SIZE},
};
use image::RgbaImage;
use instant::Duration;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Whether subject isolation can run in this session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Model reachable and session created
    Available,
    /// Model artifact not reachable
    Unavailable(String),
    /// Model reachable but the session could not be built
    Failed(String),
}

impl Capability {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "model ready"),
            Self::Unavailable(reason) => write!(f, "model unavailable ({reason})"),
            Self::Failed(reason) => write!(f, "model failed to load ({reason})"),
        }
    }
}

/// Lazily initialized saliency segmentation
pub struct SegmentationAdapter {
    config: PipelineConfig,
    factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn InferenceBackend>>,
    capability: Option<Capability>,
    model_load_time: Option<Duration>,
}

impl SegmentationAdapter {
    /// Adapter using the backends compiled into this build
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Adapter with a custom backend factory
    #[must_use]
    pub fn with_factory(config: PipelineConfig, factory: Box<dyn BackendFactory>) -> Self {
        Self {
            config,
            factory,
            backend: None,
            capability: None,
            model_load_time: None,
        }
    }

    /// Adapter with a pre-built backend; the model is still probed and loaded into it
    #[must_use]
    pub fn with_backend(config: PipelineConfig, backend: Box<dyn InferenceBackend>) -> Self {
        let mut adapter = Self::new(config);
        adapter.backend = Some(backend);
        adapter
    }

    /// Capability resolved by the first call, `None` before it
    #[must_use]
    pub fn capability(&self) -> Option<&Capability> {
        self.capability.as_ref()
    }

    /// Time spent loading the model, once loaded
    #[must_use]
    pub fn model_load_time(&self) -> Option<Duration> {
        self.model_load_time
    }

    /// Resolve the capability, probing and loading the model on first use
    pub async fn ensure_ready(&mut self) -> &Capability {
        let capability = match self.capability.take() {
            Some(cached) => cached,
            None => {
                let resolved = self.resolve().await;
                match &resolved {
                    Capability::Available => info!("Segmentation ready"),
                    other => warn!("Segmentation disabled: {other}"),
                }
                resolved
            }
        };
        self.capability.insert(capability)
    }

    async fn resolve(&mut self) -> Capability {
        let location = self.config.model.clone();
        let probe = match ModelProbe::new() {
            Ok(probe) => probe,
            Err(e) => return Capability::Failed(e.to_string()),
        };

        if let Err(e) = probe.probe(&location).await {
            return Capability::Unavailable(e.to_string());
        }

        let bytes = match probe.fetch(&location).await {
            Ok(bytes) => bytes,
            Err(e) => return Capability::Failed(e.to_string()),
        };

        let mut backend = match self.backend.take() {
            Some(backend) => backend,
            None => match self.factory.create_backend(self.config.backend_type) {
                Ok(backend) => backend,
                Err(e) => return Capability::Failed(e.to_string()),
            },
        };

        match backend.initialize(&self.config, &bytes) {
            Ok(load_time) => {
                self.model_load_time = load_time;
                self.backend = Some(backend);
                Capability::Available
            },
            Err(e) => Capability::Failed(e.to_string()),
        }
    }

    /// Compute the foreground mask for a buffer
    ///
    /// Returns `Ok(None)` when the model is unavailable or failed to load.
    ///
    /// # Errors
    /// - Per-item inference failures, which leave the adapter usable
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub async fn segment(&mut self, image: &RgbaImage) -> Result<Option<Mask>> {
        if !self.ensure_ready().await.is_available() {
            return Ok(None);
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| WhiteMuseError::internal("Backend missing after successful load"))?;

        let input = ImagePreprocessor::preprocess_for_inference(image, MODEL_INPUT_SIZE)?;
        let output = backend.infer(&input)?;
        let raw = ImagePreprocessor::tensor_to_mask(&output, image.dimensions())?;
        let mask = blur_mask(&raw, MASK_SMOOTH_RADIUS);

        debug!(
            foreground = mask.foreground_ratio(),
            "Segmentation produced mask"
        );
        Ok(Some(mask))
    }
}

impl fmt::Debug for SegmentationAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentationAdapter")
            .field("model", &self.config.model.display_name())
            .field("backend_type", &self.config.backend_type)
            .field("capability", &self.capability)
            .field("backend_loaded", &self.backend.is_some())
            .finish_non_exhaustive()
    }
}
