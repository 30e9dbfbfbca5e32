// Keyword Spotting Front-End - Rust Audio Core
// Microphone acquisition with adaptive gain, streaming keyword detection and
// a lock-free event hand-off to a status indicator

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fixtures;
pub mod indicator;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{
    ClassificationResult, CycleOutcome, DetectionLoop, StreamingClassifier, TriggerPolicy,
};
pub use audio::{adjust_gain, Microphone, SignalAdapter, SignalSource};
pub use config::AppConfig;
pub use engine::{start_frontend, FrontendHandles};
pub use events::{event_channel, DetectionEvent, EventReceiver, EventSender};
pub use indicator::{IndicatorDriver, IndicatorState, IndicatorTask, Rgb};

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "kws_frontend=info";

/// Initialize desktop logging
///
/// Honors `RUST_LOG`; safe to call more than once (later calls are no-ops).
/// Records emitted through the `log` facade (config loading) are bridged.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Verify the public surface is reachable from the crate root
        let config = AppConfig::default();
        assert_eq!(config.detection.event_capacity, 5);
        let _policy = TriggerPolicy::default();
        let _state = IndicatorState::new(config.indicator);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
