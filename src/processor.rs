//! Product photo session
//!
//! [`Studio`] owns the item set, the sticky session style, the segmentation
//! adapter and the calibrator. Items are processed strictly one after another:
//! segmentation, tone normalization and compositing finish for one item before
//! the next begins, and a failure in one item never aborts the batch.

use crate::{
    calibration::Calibrator,
    composite::composite,
    config::{EnhanceOptions, PipelineConfig, Variant},
    copy::CopyContext,
    enhance::enhance,
    error::{Result, WhiteMuseError},
    segmentation::{Capability, SegmentationAdapter},
    services::{
        BatchProcessingStats, ImageIOService, ProcessingStage, ProgressReporter, ProgressTracker,
    },
    text_evidence::{recognize_text, retake_guidance, OcrProgress, TextRecognizer},
    types::{Item, ItemStatus, ProcessingTimings, SizeEstimate},
};
use instant::Instant;
use log::{debug, info, warn};
use std::path::Path;
use tracing::{info_span, instrument, Instrument};

/// Interactive product photo session
#[derive(Debug)]
pub struct Studio {
    config: PipelineConfig,
    style: EnhanceOptions,
    adapter: SegmentationAdapter,
    items: Vec<Item>,
    calibrator: Calibrator,
    progress: ProgressTracker,
}

impl Studio {
    /// Create a session with the backends compiled into this build
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let adapter = SegmentationAdapter::new(config.clone());
        Self::with_adapter(config, adapter)
    }

    /// Create a session around an existing segmentation adapter
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_adapter(config: PipelineConfig, adapter: SegmentationAdapter) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            style: config.enhance,
            config,
            adapter,
            items: Vec::new(),
            calibrator: Calibrator::default(),
            progress: ProgressTracker::no_op(),
        })
    }

    /// Route progress updates to `reporter`
    pub fn set_progress_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.progress = ProgressTracker::new(reporter);
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current sticky session style
    #[must_use]
    pub fn style(&self) -> &EnhanceOptions {
        &self.style
    }

    /// Set the session strength
    ///
    /// # Errors
    /// - Strength outside [0, 1]
    pub fn set_strength(&mut self, strength: f32) -> Result<()> {
        let candidate = EnhanceOptions {
            strength,
            ..self.style
        };
        candidate.validate()?;
        self.style = candidate;
        Ok(())
    }

    /// Force one style flag on and the others off
    ///
    /// The forced flag stays on for later runs until another variant is
    /// forced or the style is reset.
    pub fn force_variant(&mut self, variant: Variant) {
        self.style = self.style.with_only_variant(variant);
        debug!("Session style now {:?}", self.style);
    }

    /// Return to the configured style, clearing all forced flags
    pub fn reset_style(&mut self) {
        self.style = self.config.enhance;
    }

    /// Segmentation capability, `None` until the first item ran
    #[must_use]
    pub fn capability(&self) -> Option<&Capability> {
        self.adapter.capability()
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn calibrator_mut(&mut self) -> &mut Calibrator {
        &mut self.calibrator
    }

    /// Discard the current item set and take ownership of `items`
    pub fn replace_items(&mut self, items: Vec<Item>) {
        let released = std::mem::replace(&mut self.items, items);
        if !released.is_empty() {
            info!("Released {} previous item(s)", released.len());
        }
        drop(released);
        if self.calibrator.is_active() {
            self.calibrator.reset();
        }
    }

    /// Append an item, returning its index
    pub fn add_item(&mut self, item: Item) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    /// Decode encoded image bytes into a new item
    ///
    /// # Errors
    /// - Image decoding failures
    pub fn add_bytes<S: Into<String>>(&mut self, name: S, bytes: &[u8]) -> Result<usize> {
        let item = Item::from_bytes(name, bytes, self.config.working_max_dimension)?;
        Ok(self.add_item(item))
    }

    /// Load an image file into a new item named after the file
    ///
    /// # Errors
    /// - File read or decoding failures
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let image = ImageIOService::load_image(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(self.add_item(Item::from_image(
            name,
            image,
            self.config.working_max_dimension,
        )))
    }

    /// Run the pipeline over every item in order
    ///
    /// Returns the final batch counters. Individual failures are recorded on
    /// the affected item's status.
    #[instrument(skip(self), fields(items = self.items.len(), strength = self.style.strength))]
    pub async fn process_all(&mut self) -> BatchProcessingStats {
        let total = self.items.len();
        let mut stats = BatchProcessingStats {
            items_total: total,
            ..BatchProcessingStats::default()
        };

        for index in 0..total {
            let status = match self.process_item(index).await {
                Ok(status) => status,
                Err(e) => ItemStatus::Failed(e.to_string()),
            };
            if matches!(status, ItemStatus::NoIsolation(_) | ItemStatus::Failed(_)) {
                stats.items_failed += 1;
            }
            stats.items_completed = index + 1;
            stats.current_item_name = self
                .items
                .get(index)
                .map(|item| item.name.clone())
                .unwrap_or_default();
            stats.current_item_status = status.to_string();
            self.progress.report_batch_progress(stats.clone());
        }

        info!(
            "Batch finished: {}/{} items, {} without isolation",
            stats.items_completed, stats.items_total, stats.items_failed
        );
        stats
    }

    /// Run the pipeline over one item
    ///
    /// # Errors
    /// - Index out of range
    pub async fn process_item(&mut self, index: usize) -> Result<ItemStatus> {
        let Self {
            adapter,
            items,
            progress,
            style,
            ..
        } = self;
        let item = items
            .get_mut(index)
            .ok_or_else(|| WhiteMuseError::invalid_config(format!("no item at index {index}")))?;

        let span = info_span!("item", name = %item.name, id = %item.id);
        run_pipeline(adapter, item, style, progress)
            .instrument(span)
            .await;
        Ok(item.status.clone())
    }

    /// Measure an item's subject with the current calibration
    ///
    /// `Ok(None)` means no measurement is possible yet: the item has no
    /// mask, or calibration has not recorded two taps.
    ///
    /// # Errors
    /// - Index out of range
    pub fn measure_item(&mut self, index: usize) -> Result<Option<SizeEstimate>> {
        let item = self
            .items
            .get_mut(index)
            .ok_or_else(|| WhiteMuseError::invalid_config(format!("no item at index {index}")))?;
        if self.calibrator.mm_per_px().is_none() {
            debug!("Item {} not measured, calibration incomplete", index);
            return Ok(None);
        }
        let size = self.calibrator.measure(item.mask.as_ref())?;
        item.size = size;
        Ok(size)
    }

    /// Recognize and score text on an item's processed image
    ///
    /// Stores the result on the item and returns retake guidance when too
    /// little text was found.
    ///
    /// # Errors
    /// - Index out of range
    /// - Recognizer failures, including `Unavailable`
    pub async fn analyze_text(
        &mut self,
        index: usize,
        recognizer: &dyn TextRecognizer,
        on_progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> Result<Option<&'static str>> {
        let item = self
            .items
            .get_mut(index)
            .ok_or_else(|| WhiteMuseError::invalid_config(format!("no item at index {index}")))?;

        self.progress.restart();
        self.progress.report_stage(ProcessingStage::TextRecognition);
        let result = match recognize_text(recognizer, &item.after, on_progress).await {
            Ok(result) => result,
            Err(e) => {
                self.progress.report_error(&e.to_string());
                return Err(e);
            },
        };

        let guidance = retake_guidance(&result.text);
        if guidance.is_some() {
            info!("Too little text on '{}', suggesting a retake", item.name);
        }
        item.ocr = Some(result);
        Ok(guidance)
    }

    /// Copy context built from an item's derived metadata
    ///
    /// # Errors
    /// - Index out of range
    pub fn copy_context<S: Into<String>>(&self, index: usize, category: S) -> Result<CopyContext> {
        self.items
            .get(index)
            .map(|item| CopyContext::from_item(item, category))
            .ok_or_else(|| WhiteMuseError::invalid_config(format!("no item at index {index}")))
    }

    /// End the session and hand the items to the caller
    #[must_use]
    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

async fn run_pipeline(
    adapter: &mut SegmentationAdapter,
    item: &mut Item,
    style: &EnhanceOptions,
    progress: &mut ProgressTracker,
) {
    item.reset_results();
    progress.restart();
    let total_start = Instant::now();
    let mut timings = ProcessingTimings::default();

    if adapter.capability().is_none() {
        progress.report_stage(ProcessingStage::ModelProbe);
        let load_start = Instant::now();
        adapter.ensure_ready().await;
        timings.model_load_ms = load_start.elapsed().as_millis() as u64;
    }

    progress.report_stage(ProcessingStage::Segmentation);
    let segmentation_start = Instant::now();
    let (mask, mut status) = match adapter.segment(&item.before).await {
        Ok(Some(mask)) => (Some(mask), ItemStatus::Isolated),
        Ok(None) => (None, ItemStatus::ModelUnavailable),
        Err(e) => {
            warn!("Segmentation failed for '{}': {e}", item.name);
            progress.report_error(&e.to_string());
            (None, ItemStatus::NoIsolation(e.to_string()))
        },
    };
    timings.segmentation_ms = segmentation_start.elapsed().as_millis() as u64;

    progress.report_stage(ProcessingStage::ToneNormalization);
    let enhance_start = Instant::now();
    let toned = enhance(&item.before, mask.as_ref(), style);
    timings.enhance_ms = enhance_start.elapsed().as_millis() as u64;

    progress.report_stage(ProcessingStage::Compositing);
    let composite_start = Instant::now();
    let composed = toned.and_then(|buffer| composite(&buffer, mask.as_ref(), style));
    timings.composite_ms = composite_start.elapsed().as_millis() as u64;

    match composed {
        Ok(after) => item.after = after,
        Err(e) => {
            warn!("Pipeline failed for '{}': {e}", item.name);
            progress.report_error(&e.to_string());
            status = ItemStatus::Failed(e.to_string());
        },
    }

    timings.total_ms = total_start.elapsed().as_millis() as u64;
    item.mask = mask;
    item.status = status;
    item.timings = timings.clone();

    progress.report_stage(ProcessingStage::Completed);
    progress.report_completion(timings);
    debug!("'{}' finished: {}", item.name, item.status);
}
