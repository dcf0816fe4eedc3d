//! Progress reporting service
//!
//! Separates progress reporting from the pipeline so that the CLI, tests and
//! embedding applications can present progress in their own way.

use crate::types::ProcessingTimings;
use instant::Instant;

/// Stages of one item's pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Probing the model artifact and creating the session
    ModelProbe,
    /// Computing the foreground mask
    Segmentation,
    /// White balance, exposure and sharpening
    ToneNormalization,
    /// Shadow synthesis and white-background blend
    Compositing,
    /// Item finished
    Completed,
    /// Running text recognition on the processed image
    TextRecognition,
}

impl ProcessingStage {
    /// Human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::ModelProbe => "Checking segmentation model",
            ProcessingStage::Segmentation => "Isolating subject",
            ProcessingStage::ToneNormalization => "Normalizing tone",
            ProcessingStage::Compositing => "Compositing on white",
            ProcessingStage::Completed => "Processing completed",
            ProcessingStage::TextRecognition => "Recognizing text",
        }
    }

    /// Typical progress percentage within one item
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::ModelProbe => 5,
            ProcessingStage::Segmentation => 60,
            ProcessingStage::ToneNormalization => 80,
            ProcessingStage::Compositing => 95,
            ProcessingStage::Completed => 100,
            ProcessingStage::TextRecognition => 50,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Batch counters reported after each item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProcessingStats {
    /// Number of items finished (successfully or not)
    pub items_completed: usize,
    /// Total number of items in the batch
    pub items_total: usize,
    /// Items whose isolation failed
    pub items_failed: usize,
    /// Name of the item that just finished
    pub current_item_name: String,
    /// Status text of the item that just finished
    pub current_item_status: String,
}

impl BatchProcessingStats {
    /// Overall batch progress percentage
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.items_total == 0 {
            return 100;
        }
        ((self.items_completed * 100) / self.items_total).min(100) as u8
    }
}

/// Trait for receiving progress during pipeline runs
pub trait ProgressReporter: Send + Sync {
    /// Report a stage change for the current item
    fn report_progress(&self, update: ProgressUpdate);

    /// Report completion of one item with its timings
    fn report_completion(&self, timings: ProcessingTimings);

    /// Report a failure at the given stage
    fn report_error(&self, stage: ProcessingStage, error: &str);

    /// Report batch counters after an item finished
    fn report_batch_progress(&self, stats: BatchProcessingStats) {
        drop(stats);
    }
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Progress reporter that logs through the `log` facade
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::debug!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        log::info!("Item processed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  model load: {}ms", timings.model_load_ms);
            log::info!("  segmentation: {}ms", timings.segmentation_ms);
            log::info!("  tone: {}ms", timings.enhance_ms);
            log::info!("  composite: {}ms", timings.composite_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("Error during {}: {}", stage.description(), error);
    }

    fn report_batch_progress(&self, stats: BatchProcessingStats) {
        log::info!(
            "[{}/{}] {}: {}",
            stats.items_completed,
            stats.items_total,
            stats.current_item_name,
            stats.current_item_status
        );
    }
}

/// Progress tracker that manages timing and the current stage
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Tracker that discards everything
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Box::new(NoOpProgressReporter))
    }

    /// Tracker that logs to the console
    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Box::new(ConsoleProgressReporter::new(verbose)))
    }

    /// Restart the elapsed-time clock for a new item
    pub fn restart(&mut self) {
        self.start_time = Instant::now();
        self.current_stage = None;
    }

    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage.clone());
        let update = ProgressUpdate::new(stage, self.start_time);
        self.reporter.report_progress(update);
    }

    pub fn report_completion(&self, timings: ProcessingTimings) {
        self.reporter.report_completion(timings);
    }

    /// Report an error at the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self
            .current_stage
            .clone()
            .unwrap_or(ProcessingStage::ModelProbe);
        self.reporter.report_error(stage, error);
    }

    pub fn report_batch_progress(&self, stats: BatchProcessingStats) {
        self.reporter.report_batch_progress(stats);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<&ProcessingStage> {
        self.current_stage.as_ref()
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("current_stage", &self.current_stage)
            .finish_non_exhaustive()
    }
}
