//! Error types for the product photo pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, WhiteMuseError>;

/// Error types for pipeline, calibration and learning operations
///
/// The variants follow the containment policy of the pipeline: `Unavailable`
/// degrades a feature, `Inference` fails a single item, `CalibrationIncomplete`
/// is reported as "not yet measured" and `PersistenceCorrupt` triggers a reset
/// of the learning profile. None of them abort a batch.
#[derive(Error, Debug)]
pub enum WhiteMuseError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Model or recognition engine not reachable
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Per-item inference failure
    #[error("Inference error: {0}")]
    Inference(String),

    /// Fewer than two calibration taps, or a degenerate tap pair
    #[error("Calibration incomplete: {0}")]
    CalibrationIncomplete(String),

    /// Stored learning record unreadable or malformed
    #[error("Persisted record corrupt: {0}")]
    PersistenceCorrupt(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pixel buffer or tensor processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Network errors while probing or fetching the model artifact
    #[error("Network error: {0}")]
    Network(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WhiteMuseError {
    /// Create a new unavailable error
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new calibration error
    pub fn calibration_incomplete<S: Into<String>>(msg: S) -> Self {
        Self::CalibrationIncomplete(msg.into())
    }

    /// Create a new persistence error
    pub fn persistence_corrupt<S: Into<String>>(msg: S) -> Self {
        Self::PersistenceCorrupt(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create network error with the failing operation
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {}", context.into(), error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Whether the error only degrades a feature instead of failing an item
    #[must_use]
    pub fn is_degradation(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::CalibrationIncomplete(_) | Self::PersistenceCorrupt(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = WhiteMuseError::invalid_config("test config error");
        assert!(matches!(err, WhiteMuseError::InvalidConfig(_)));

        let err = WhiteMuseError::unavailable("model missing");
        assert!(matches!(err, WhiteMuseError::Unavailable(_)));
        assert!(err.is_degradation());

        let err = WhiteMuseError::inference("bad output");
        assert!(!err.is_degradation());
    }

    #[test]
    fn test_error_display() {
        let err = WhiteMuseError::invalid_config("strength out of range");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: strength out of range"
        );

        let err = WhiteMuseError::calibration_incomplete("1 of 2 taps");
        assert_eq!(err.to_string(), "Calibration incomplete: 1 of 2 taps");
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err =
            WhiteMuseError::file_io_error("write profile", Path::new("/data/profile.json"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write profile"));
        assert!(error_string.contains("/data/profile.json"));

        let err = WhiteMuseError::config_value_error("strength", 1.5, "0.0-1.0", Some(0.6));
        let error_string = err.to_string();
        assert!(error_string.contains("strength"));
        assert!(error_string.contains("1.5"));
        assert!(error_string.contains("Recommended: 0.6"));

        let err = WhiteMuseError::processing_stage_error(
            "composite",
            "mask size mismatch",
            Some("640x480"),
        );
        let error_string = err.to_string();
        assert!(error_string.contains("composite"));
        assert!(error_string.contains("640x480"));

        let err = WhiteMuseError::network_error("probe model", "connection refused");
        assert_eq!(err.to_string(), "Network error: probe model: connection refused");
    }
}
