// Detection error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Detection error code constants
///
/// Single source of truth for the numeric codes carried by
/// [`DetectionError`]. Reports written by the benchmark driver use these
/// values, so they must stay stable.
///
/// Error code range: 3001-3003
pub struct DetectionErrorCodes {}

impl DetectionErrorCodes {
    /// Malformed configuration (even window, non-positive coefficients, bad cutoffs)
    pub const INVALID_PARAMETER: i32 = 3001;

    /// Signal too short for the requested window or stencil
    pub const DEGENERATE_INPUT: i32 = 3002;

    /// A numerical stage produced a non-finite or singular result
    pub const NUMERIC_FAILURE: i32 = 3003;
}

/// Log a detection error with structured context
///
/// This function logs detection errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The pipeline stage that raised the error
/// - message: Human-readable error message
/// - context: Additional contextual information (sample name, method)
pub fn log_detection_error(err: &DetectionError, context: &str) {
    error!(
        "Detection error in {}: code={}, component={}, message={}",
        context,
        err.code(),
        err.component(),
        err.message()
    );
}

/// Errors raised by the smoothing, baseline, filtering and detection stages
///
/// All variants are raised at the point of detection; multi-stage pipelines
/// stop at the first failing stage. Scoring never produces these errors: an
/// empty match set is reported through NaN metrics instead.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// A parameter is outside its valid domain
    InvalidParameter { name: String, reason: String },

    /// The signal is too short (or empty) for the requested operation
    DegenerateInput { reason: String },

    /// A numerical stage failed to produce a finite result
    NumericFailure { stage: String, reason: String },
}

impl DetectionError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        DetectionError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn degenerate_input(reason: impl Into<String>) -> Self {
        DetectionError::DegenerateInput {
            reason: reason.into(),
        }
    }

    pub fn numeric_failure(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        DetectionError::NumericFailure {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Component label used in structured logs
    pub fn component(&self) -> &str {
        match self {
            DetectionError::InvalidParameter { .. } => "Parameters",
            DetectionError::DegenerateInput { .. } => "Input",
            DetectionError::NumericFailure { stage, .. } => stage,
        }
    }
}

impl ErrorCode for DetectionError {
    fn code(&self) -> i32 {
        match self {
            DetectionError::InvalidParameter { .. } => DetectionErrorCodes::INVALID_PARAMETER,
            DetectionError::DegenerateInput { .. } => DetectionErrorCodes::DEGENERATE_INPUT,
            DetectionError::NumericFailure { .. } => DetectionErrorCodes::NUMERIC_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectionError::InvalidParameter { name, reason } => {
                format!("Invalid parameter '{}': {}", name, reason)
            }
            DetectionError::DegenerateInput { reason } => {
                format!("Degenerate input: {}", reason)
            }
            DetectionError::NumericFailure { stage, reason } => {
                format!("Numeric failure in {}: {}", stage, reason)
            }
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectionError::{} (code {}): {}",
            self.variant_name(),
            self.code(),
            self.message()
        )
    }
}

impl DetectionError {
    fn variant_name(&self) -> &'static str {
        match self {
            DetectionError::InvalidParameter { .. } => "InvalidParameter",
            DetectionError::DegenerateInput { .. } => "DegenerateInput",
            DetectionError::NumericFailure { .. } => "NumericFailure",
        }
    }
}

impl std::error::Error for DetectionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_error_codes() {
        assert_eq!(
            DetectionError::invalid_parameter("window_len", "must be odd").code(),
            DetectionErrorCodes::INVALID_PARAMETER
        );
        assert_eq!(
            DetectionError::degenerate_input("too short").code(),
            DetectionErrorCodes::DEGENERATE_INPUT
        );
        assert_eq!(
            DetectionError::numeric_failure("Baseline", "nan").code(),
            DetectionErrorCodes::NUMERIC_FAILURE
        );
    }

    #[test]
    fn test_detection_error_messages() {
        let err = DetectionError::invalid_parameter("window_len", "must be odd (got 4)");
        assert_eq!(
            err.message(),
            "Invalid parameter 'window_len': must be odd (got 4)"
        );

        let err = DetectionError::degenerate_input("need at least 3 samples");
        assert_eq!(err.message(), "Degenerate input: need at least 3 samples");

        let err = DetectionError::numeric_failure("Baseline", "non-finite solution");
        assert_eq!(
            err.message(),
            "Numeric failure in Baseline: non-finite solution"
        );
    }

    #[test]
    fn test_detection_error_display() {
        let err = DetectionError::degenerate_input("empty signal");
        let display = format!("{}", err);
        assert!(display.contains("DetectionError::DegenerateInput"));
        assert!(display.contains(&err.code().to_string()));
        assert!(display.contains("empty signal"));
    }

    #[test]
    fn test_component_labels() {
        assert_eq!(
            DetectionError::numeric_failure("Baseline", "x").component(),
            "Baseline"
        );
        assert_eq!(
            DetectionError::invalid_parameter("a", "b").component(),
            "Parameters"
        );
    }
}
