// Error types for the keyword-spotting front-end
//
// This module defines custom error types for acquisition, classification
// and indicator operations, each carrying a stable numeric code so that
// faults can be reported in logs and diagnostics consistently.

mod audio;
mod classifier;
mod indicator;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use classifier::{log_classifier_error, ClassifierError, ClassifierErrorCodes};
pub use indicator::{log_indicator_error, IndicatorError, IndicatorErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// task boundaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
