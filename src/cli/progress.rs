//! Progress bar reporter for batch runs

use crate::services::{BatchProcessingStats, ProcessingStage, ProgressReporter, ProgressUpdate};
use crate::types::ProcessingTimings;
use indicatif::{ProgressBar, ProgressStyle};

/// Drives an `indicatif` bar: one tick per finished item, stage text as message
#[derive(Clone)]
pub struct IndicatifProgressReporter {
    bar: ProgressBar,
    verbose: bool,
}

impl IndicatifProgressReporter {
    #[must_use]
    pub fn new(total: usize, verbose: bool) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar, verbose }
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.bar.set_message(update.description);
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        if self.verbose {
            self.bar.println(format!(
                "  segmentation {}ms, tone {}ms, composite {}ms (total {}ms)",
                timings.segmentation_ms, timings.enhance_ms, timings.composite_ms, timings.total_ms
            ));
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar
            .println(format!("❌ {} failed: {error}", stage.description()));
    }

    fn report_batch_progress(&self, stats: BatchProcessingStats) {
        self.bar.set_position(stats.items_completed as u64);
        self.bar.println(format!(
            "[{}/{}] {}: {}",
            stats.items_completed, stats.items_total, stats.current_item_name, stats.current_item_status
        ));
    }
}
