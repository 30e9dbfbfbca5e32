// Status indicator error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::error;

/// Indicator error code constants
///
/// Error code range: 3001-3002
pub struct IndicatorErrorCodes {}

impl IndicatorErrorCodes {
    /// Indicator hardware could not be acquired
    pub const HARDWARE_INIT_FAILED: i32 = 3001;

    /// Indicator task could not be spawned
    pub const TASK_SPAWN_FAILED: i32 = 3002;
}

/// Log an indicator error with structured context
pub fn log_indicator_error(err: &IndicatorError, context: &str) {
    error!(
        "Indicator error in {}: code={}, component=StatusIndicator, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Status indicator errors
///
/// Only start-up failures exist; steady-state rendering is infallible.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorError {
    /// Indicator hardware could not be acquired
    HardwareInitFailed { reason: String },

    /// Indicator task could not be spawned
    TaskSpawnFailed { reason: String },
}

impl ErrorCode for IndicatorError {
    fn code(&self) -> i32 {
        match self {
            IndicatorError::HardwareInitFailed { .. } => IndicatorErrorCodes::HARDWARE_INIT_FAILED,
            IndicatorError::TaskSpawnFailed { .. } => IndicatorErrorCodes::TASK_SPAWN_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            IndicatorError::HardwareInitFailed { reason } => {
                format!("Indicator hardware initialization failed: {}", reason)
            }
            IndicatorError::TaskSpawnFailed { reason } => {
                format!("Failed to spawn indicator task: {}", reason)
            }
        }
    }
}

impl fmt::Display for IndicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IndicatorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for IndicatorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_error_codes() {
        assert_eq!(
            IndicatorError::HardwareInitFailed {
                reason: "rmt".to_string()
            }
            .code(),
            3001
        );
        assert_eq!(
            IndicatorError::TaskSpawnFailed {
                reason: "oom".to_string()
            }
            .code(),
            3002
        );
    }

    #[test]
    fn test_indicator_error_message() {
        let err = IndicatorError::HardwareInitFailed {
            reason: "no device".to_string(),
        };
        assert!(err.message().contains("no device"));
        assert!(format!("{}", err).contains("3001"));
    }
}
