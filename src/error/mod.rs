// Error types for the peak benchmark library
//
// This module defines the structured error type raised by the detection
// pipelines, with numeric error codes so drivers can report failures
// consistently across samples and methods.

mod detection;

pub use detection::{log_detection_error, DetectionError, DetectionErrorCodes};

/// Result alias used by every pipeline stage
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Numeric code and message of a pipeline error
///
/// The benchmark report and the CLI log both carry these values.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
