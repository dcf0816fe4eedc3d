//! Configuration types for the product photo pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the model artifact location
pub const MODEL_ENV_VAR: &str = "WHITEMUSE_MODEL";

/// Default model artifact path, relative to the working directory
pub const DEFAULT_MODEL_PATH: &str = "models/silueta.onnx";

/// Default longest side of the working "before" buffer
pub const DEFAULT_WORKING_MAX_DIMENSION: u32 = 1600;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Encoded output format for processed images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// PNG (lossless, opaque output)
    #[default]
    Png,
    /// JPEG with the configured quality
    Jpeg,
}

impl OutputFormat {
    /// Conventional file extension
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = crate::error::WhiteMuseError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(crate::error::WhiteMuseError::invalid_config(format!(
                "Unsupported output format '{}'. Use png or jpeg",
                other
            ))),
        }
    }
}

/// Inference engine used by the segmentation adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

/// Where the segmentation model artifact lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelLocation {
    /// A file on the local filesystem
    Local(PathBuf),
    /// An HTTP(S) URL
    Remote(String),
}

impl ModelLocation {
    /// Interpret a user-supplied string as a URL or a path
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Remote(value.to_string())
        } else {
            Self::Local(PathBuf::from(value))
        }
    }

    /// Resolve the default location, honouring `WHITEMUSE_MODEL`
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(MODEL_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => Self::parse(value.trim()),
            _ => Self::Local(PathBuf::from(DEFAULT_MODEL_PATH)),
        }
    }

    /// Human-readable name for logs and status lines
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Remote(url) => url.clone(),
        }
    }
}

impl Default for ModelLocation {
    fn default() -> Self {
        Self::from_env()
    }
}

/// One-shot style override applied on top of the session style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    /// Stronger sharpening to keep product edges crisp
    EdgePriority,
    /// Lighter contact shadow
    WeakShadow,
    /// Brighter, higher-contrast "white studio" look
    StrongWhite,
}

impl std::str::FromStr for Variant {
    type Err = crate::error::WhiteMuseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "edge" | "edge-priority" => Ok(Self::EdgePriority),
            "weak-shadow" | "shadow" => Ok(Self::WeakShadow),
            "strong-white" | "white" => Ok(Self::StrongWhite),
            other => Err(crate::error::WhiteMuseError::invalid_config(format!(
                "Unknown variant '{other}' (expected edge-priority, weak-shadow or strong-white)"
            ))),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EdgePriority => write!(f, "edge-priority"),
            Self::WeakShadow => write!(f, "weak-shadow"),
            Self::StrongWhite => write!(f, "strong-white"),
        }
    }
}

/// Enhancement knobs shared by the tone normalizer and the compositor
///
/// All magnitudes interpolate linearly from their neutral value at
/// `strength = 0` to their ceiling at `strength = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhanceOptions {
    /// Overall enhancement strength in [0, 1]
    pub strength: f32,
    /// Prefer crisp edges (stronger unsharp mask)
    pub edge_priority: bool,
    /// Lighter contact shadow
    pub weak_shadow: bool,
    /// Extra exposure and contrast for a whiter background
    pub strong_white: bool,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            strength: 0.6,
            edge_priority: false,
            weak_shadow: false,
            strong_white: false,
        }
    }
}

impl EnhanceOptions {
    pub const EXPOSURE_CEILING: f32 = 1.12;
    pub const CONTRAST_CEILING: f32 = 1.10;
    pub const STRONG_WHITE_EXPOSURE_BONUS: f32 = 0.06;
    pub const STRONG_WHITE_CONTRAST_BONUS: f32 = 0.04;
    pub const SATURATION_BOOST: f32 = 0.20;
    pub const DENOISE_DESATURATION: f32 = 0.10;
    pub const SHARPEN_AMOUNT: f32 = 0.55;
    pub const EDGE_SHARPEN_AMOUNT: f32 = 0.85;
    pub const SHADOW_OPACITY: f32 = 0.28;
    pub const WEAK_SHADOW_OPACITY: f32 = 0.18;
    pub const MAX_SHADOW_OFFSET: f32 = 10.0;

    /// Options with the given strength (clamped to [0, 1]) and no style flags
    #[must_use]
    pub fn with_strength(strength: f32) -> Self {
        Self {
            strength: clamp_unit(strength),
            ..Self::default()
        }
    }

    /// Turn one variant flag on, keeping the other flags as they are
    #[must_use]
    pub fn with_variant(mut self, variant: Variant) -> Self {
        match variant {
            Variant::EdgePriority => self.edge_priority = true,
            Variant::WeakShadow => self.weak_shadow = true,
            Variant::StrongWhite => self.strong_white = true,
        }
        self
    }

    /// Force exactly one variant flag on and clear the other two
    #[must_use]
    pub fn with_only_variant(self, variant: Variant) -> Self {
        Self {
            edge_priority: false,
            weak_shadow: false,
            strong_white: false,
            ..self
        }
        .with_variant(variant)
    }

    /// Validate the strength range
    ///
    /// # Errors
    /// - Strength outside [0, 1] or not finite
    pub fn validate(&self) -> crate::Result<()> {
        if !self.strength.is_finite() || !(0.0..=1.0).contains(&self.strength) {
            return Err(crate::error::WhiteMuseError::config_value_error(
                "strength",
                self.strength,
                "0.0-1.0",
                Some(0.6),
            ));
        }
        Ok(())
    }

    fn lerp(&self, neutral: f32, ceiling: f32) -> f32 {
        neutral + (ceiling - neutral) * clamp_unit(self.strength)
    }

    /// Exposure multiplier
    #[must_use]
    pub fn exposure_gain(&self) -> f32 {
        let bonus = if self.strong_white {
            Self::STRONG_WHITE_EXPOSURE_BONUS
        } else {
            0.0
        };
        self.lerp(1.0, Self::EXPOSURE_CEILING + bonus)
    }

    /// Contrast multiplier around mid-gray
    #[must_use]
    pub fn contrast_gain(&self) -> f32 {
        let bonus = if self.strong_white {
            Self::STRONG_WHITE_CONTRAST_BONUS
        } else {
            0.0
        };
        self.lerp(1.0, Self::CONTRAST_CEILING + bonus)
    }

    /// Saturation boost added to 1.0
    #[must_use]
    pub fn saturation_boost(&self) -> f32 {
        self.lerp(0.0, Self::SATURATION_BOOST)
    }

    /// Desaturation blend applied after the boost
    #[must_use]
    pub fn denoise_desaturation(&self) -> f32 {
        self.lerp(0.0, Self::DENOISE_DESATURATION)
    }

    /// Unsharp-mask amount
    #[must_use]
    pub fn sharpen_amount(&self) -> f32 {
        let ceiling = if self.edge_priority {
            Self::EDGE_SHARPEN_AMOUNT
        } else {
            Self::SHARPEN_AMOUNT
        };
        self.lerp(0.0, ceiling)
    }

    /// Contact shadow opacity
    #[must_use]
    pub fn shadow_opacity(&self) -> f32 {
        let ceiling = if self.weak_shadow {
            Self::WEAK_SHADOW_OPACITY
        } else {
            Self::SHADOW_OPACITY
        };
        self.lerp(0.0, ceiling)
    }

    /// Rows between a pixel and the shadow-source row sampled above it
    #[must_use]
    pub fn shadow_offset(&self) -> u32 {
        (clamp_unit(self.strength) * Self::MAX_SHADOW_OFFSET).round() as u32
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Configuration for the item pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Location of the segmentation model artifact
    pub model: ModelLocation,

    /// Inference engine
    pub backend_type: BackendType,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Longest side of the working "before" buffer
    pub working_max_dimension: u32,

    /// Session enhancement style
    pub enhance: EnhanceOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: ModelLocation::default(),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            working_max_dimension: DEFAULT_WORKING_MAX_DIMENSION,
            enhance: EnhanceOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use whitemuse::{PipelineConfig, ExecutionProvider};
    ///
    /// let config = PipelineConfig::builder()
    ///     .execution_provider(ExecutionProvider::Cpu)
    ///     .strength(0.8)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.enhance.strength, 0.8);
    /// ```
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Working dimension of zero
    /// - Enhancement strength outside [0, 1]
    pub fn validate(&self) -> crate::Result<()> {
        if self.working_max_dimension == 0 {
            return Err(crate::error::WhiteMuseError::config_value_error(
                "working max dimension",
                self.working_max_dimension,
                "1-65535",
                Some(DEFAULT_WORKING_MAX_DIMENSION),
            ));
        }
        self.enhance.validate()
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the model location
    #[must_use]
    pub fn model(mut self, model: ModelLocation) -> Self {
        self.config.model = model;
        self
    }

    /// Set the inference backend
    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set both intra and inter threads (inter = threads/2, minimum 1; 0 = auto)
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Set the working buffer's longest side
    #[must_use]
    pub fn working_max_dimension(mut self, dimension: u32) -> Self {
        self.config.working_max_dimension = dimension;
        self
    }

    /// Set the enhancement strength (clamped to [0, 1])
    #[must_use]
    pub fn strength(mut self, strength: f32) -> Self {
        self.config.enhance.strength = clamp_unit(strength);
        self
    }

    /// Replace the whole enhancement style
    #[must_use]
    pub fn enhance(mut self, enhance: EnhanceOptions) -> Self {
        self.config.enhance = enhance;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any validation failure from `PipelineConfig::validate`
    pub fn build(self) -> crate::Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
