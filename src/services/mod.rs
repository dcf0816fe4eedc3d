//! Services separating I/O and progress reporting from the pipeline

pub mod io;
pub mod progress;

pub use io::{ImageIOService, DEFAULT_JPEG_QUALITY};
pub use progress::{
    BatchProcessingStats, ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressTracker, ProgressUpdate,
};
