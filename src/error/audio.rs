// Audio acquisition error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::error;

/// Audio error code constants
///
/// Single source of truth for acquisition error codes reported in logs
/// and telemetry.
///
/// Error code range: 1001-1008
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Microphone hardware could not be brought up
    pub const MICROPHONE_INIT_FAILED: i32 = 1001;

    /// Hardware read returned an error
    pub const READ_FAILED: i32 = 1002;

    /// Hardware read produced no data for the requested window
    pub const NO_DATA: i32 = 1003;

    /// Window buffer allocation failed
    pub const BUFFER_ALLOCATION_FAILED: i32 = 1004;

    /// Requested window does not fit the allocated buffer
    pub const INVALID_WINDOW: i32 = 1005;

    /// Failed to open the capture stream
    pub const STREAM_OPEN_FAILED: i32 = 1006;

    /// Capture source is exhausted or disconnected
    pub const STREAM_FAILURE: i32 = 1007;

    /// Task could not be spawned
    pub const TASK_SPAWN_FAILED: i32 = 1008;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=SignalSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover microphone bring-up, blocking reads and the
/// window buffer owned by the detection task.
///
/// Error code ranges: 1001-1008
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Microphone hardware could not be brought up
    MicrophoneInitFailed { reason: String },

    /// Hardware read returned an error
    ReadFailed { details: String },

    /// Hardware read produced fewer units than requested
    NoData { requested: usize, received: usize },

    /// Window buffer allocation failed
    BufferAllocationFailed { bytes: usize },

    /// Requested window does not fit the allocated buffer
    InvalidWindow { requested: usize, capacity: usize },

    /// Failed to open the capture stream
    StreamOpenFailed { reason: String },

    /// Capture source is exhausted or disconnected
    StreamFailure { reason: String },

    /// Task could not be spawned
    TaskSpawnFailed { task: String, reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::MicrophoneInitFailed { .. } => AudioErrorCodes::MICROPHONE_INIT_FAILED,
            AudioError::ReadFailed { .. } => AudioErrorCodes::READ_FAILED,
            AudioError::NoData { .. } => AudioErrorCodes::NO_DATA,
            AudioError::BufferAllocationFailed { .. } => AudioErrorCodes::BUFFER_ALLOCATION_FAILED,
            AudioError::InvalidWindow { .. } => AudioErrorCodes::INVALID_WINDOW,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::TaskSpawnFailed { .. } => AudioErrorCodes::TASK_SPAWN_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::MicrophoneInitFailed { reason } => {
                format!("Microphone initialization failed: {}", reason)
            }
            AudioError::ReadFailed { details } => {
                format!("Microphone read failed: {}", details)
            }
            AudioError::NoData {
                requested,
                received,
            } => {
                format!(
                    "No data available: requested {} samples, received {}",
                    requested, received
                )
            }
            AudioError::BufferAllocationFailed { bytes } => {
                format!("Failed to allocate {} bytes for audio buffer", bytes)
            }
            AudioError::InvalidWindow {
                requested,
                capacity,
            } => {
                format!(
                    "Window of {} samples exceeds buffer capacity {}",
                    requested, capacity
                )
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::TaskSpawnFailed { task, reason } => {
                format!("Failed to spawn task {}: {}", task, reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::ReadFailed {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::MicrophoneInitFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::MICROPHONE_INIT_FAILED
        );
        assert_eq!(
            AudioError::ReadFailed {
                details: "test".to_string()
            }
            .code(),
            AudioErrorCodes::READ_FAILED
        );
        assert_eq!(
            AudioError::NoData {
                requested: 4,
                received: 0
            }
            .code(),
            AudioErrorCodes::NO_DATA
        );
        assert_eq!(
            AudioError::BufferAllocationFailed { bytes: 64 }.code(),
            AudioErrorCodes::BUFFER_ALLOCATION_FAILED
        );
        assert_eq!(
            AudioError::InvalidWindow {
                requested: 8,
                capacity: 4
            }
            .code(),
            AudioErrorCodes::INVALID_WINDOW
        );
        assert_eq!(
            AudioError::StreamOpenFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_OPEN_FAILED
        );
        assert_eq!(
            AudioError::StreamFailure {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_FAILURE
        );
        assert_eq!(
            AudioError::TaskSpawnFailed {
                task: "t".to_string(),
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::TASK_SPAWN_FAILED
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::NoData {
            requested: 512,
            received: 100,
        };
        assert_eq!(
            err.message(),
            "No data available: requested 512 samples, received 100"
        );

        let err = AudioError::ReadFailed {
            details: "bus timeout".to_string(),
        };
        assert_eq!(err.message(), "Microphone read failed: bus timeout");

        let err = AudioError::BufferAllocationFailed { bytes: 1024 };
        assert!(err.message().contains("1024 bytes"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::InvalidWindow {
            requested: 8,
            capacity: 4,
        };
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::ReadFailed { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected ReadFailed"),
        }
    }
}
