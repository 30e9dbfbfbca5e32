// Classifier error types and constants

use crate::error::{AudioError, ErrorCode};
use std::fmt;
use tracing::error;

/// Classifier error code constants
///
/// Error code range: 2001-2003
pub struct ClassifierErrorCodes {}

impl ClassifierErrorCodes {
    /// Classifier engine returned a non-success status
    pub const ENGINE_STATUS: i32 = 2001;

    /// Signal source failed while the classifier was pulling data
    pub const SIGNAL_FAILED: i32 = 2002;

    /// Classifier could not be primed
    pub const INIT_FAILED: i32 = 2003;
}

/// Log a classifier error with structured context
pub fn log_classifier_error(err: &ClassifierError, context: &str) {
    error!(
        "Classifier error in {}: code={}, component=Classifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors reported by the streaming classifier boundary
///
/// Classifier faults are never fatal to the detection loop; the cycle is
/// skipped and the loop continues.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// Engine returned a non-success status code
    EngineStatus { status: i32 },

    /// Signal source failed while filling the classifier window
    Signal(AudioError),

    /// Classifier could not be primed
    InitFailed { reason: String },
}

impl ErrorCode for ClassifierError {
    fn code(&self) -> i32 {
        match self {
            ClassifierError::EngineStatus { .. } => ClassifierErrorCodes::ENGINE_STATUS,
            ClassifierError::Signal(_) => ClassifierErrorCodes::SIGNAL_FAILED,
            ClassifierError::InitFailed { .. } => ClassifierErrorCodes::INIT_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            ClassifierError::EngineStatus { status } => {
                format!("Classifier returned {}", status)
            }
            ClassifierError::Signal(err) => {
                format!("Signal source failed: {}", err.message())
            }
            ClassifierError::InitFailed { reason } => {
                format!("Classifier initialization failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassifierError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClassifierError::Signal(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AudioError> for ClassifierError {
    fn from(err: AudioError) -> Self {
        ClassifierError::Signal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_error_codes() {
        assert_eq!(
            ClassifierError::EngineStatus { status: -5 }.code(),
            ClassifierErrorCodes::ENGINE_STATUS
        );
        assert_eq!(
            ClassifierError::Signal(AudioError::NoData {
                requested: 1,
                received: 0
            })
            .code(),
            ClassifierErrorCodes::SIGNAL_FAILED
        );
        assert_eq!(
            ClassifierError::InitFailed {
                reason: "x".to_string()
            }
            .code(),
            ClassifierErrorCodes::INIT_FAILED
        );
    }

    #[test]
    fn test_signal_error_conversion_keeps_source() {
        let err: ClassifierError = AudioError::ReadFailed {
            details: "dma".to_string(),
        }
        .into();
        assert!(err.message().contains("dma"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
