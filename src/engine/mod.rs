//! Engine module: wires the two front-end tasks together.
//!
//! ```text
//!  kws-detection (core 0, high prio)          kws-indicator (core 1, low prio)
//!  Microphone → SignalAdapter → Classifier    poll → animate → IndicatorDriver
//!                    │                          ▲
//!                    └──── event channel (5) ───┘
//! ```
//!
//! Hardware handles are built by factories inside their task so non-`Send`
//! handles (e.g. `cpal::Stream`) never cross threads. Neither task is
//! designed to stop; shutdown is a whole-process halt.

use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{info, warn};

use crate::analysis::{run_detection_task, StreamingClassifier};
use crate::audio::Microphone;
use crate::config::AppConfig;
use crate::error::{log_indicator_error, AudioError, IndicatorError};
use crate::events::event_channel;
use crate::indicator::{run_indicator_task, IndicatorDriver};
use crate::telemetry;

pub mod scheduling;

pub use scheduling::{spawn_task, Placement, TaskSpec};

/// Join handles of the running front-end threads
pub struct FrontendHandles {
    pub detection: JoinHandle<()>,
    /// `None` if the indicator task could not be spawned
    pub indicator: Option<JoinHandle<()>>,
    /// `None` when diagnostics are disabled or failed to start
    pub diagnostics: Option<JoinHandle<()>>,
}

/// Start the detection and indicator tasks
///
/// Only a failure to spawn the detection thread is returned as an error.
/// The indicator is cosmetic: if it cannot start, detection keeps running
/// with a dark indicator.
pub fn start_frontend<M, C, D, MF, DF>(
    config: AppConfig,
    microphone_factory: MF,
    classifier: C,
    driver_factory: DF,
) -> Result<FrontendHandles, AudioError>
where
    M: Microphone + 'static,
    C: StreamingClassifier + Send + 'static,
    D: IndicatorDriver + 'static,
    MF: FnOnce() -> Result<M, AudioError> + Send + 'static,
    DF: FnOnce() -> Result<D, IndicatorError> + Send + 'static,
{
    let (sender, receiver) = event_channel(config.detection.event_capacity);

    let detection_spec = TaskSpec::detection(&config.scheduling);
    let indicator_spec = TaskSpec::indicator(&config.scheduling);
    let indicator_config = config.indicator;
    let diagnostics = config.diagnostics.clone();

    let detection_name = detection_spec.name.clone();
    let detection = spawn_task(detection_spec, move || {
        run_detection_task(config, microphone_factory, classifier, sender)
    })
    .map_err(|e| AudioError::TaskSpawnFailed {
        task: detection_name,
        reason: e.to_string(),
    })?;

    let indicator = match spawn_task(indicator_spec, move || {
        run_indicator_task(indicator_config, driver_factory, receiver)
    }) {
        Ok(handle) => Some(handle),
        Err(e) => {
            log_indicator_error(
                &IndicatorError::TaskSpawnFailed {
                    reason: e.to_string(),
                },
                "start_frontend",
            );
            None
        }
    };

    let diagnostics = if diagnostics.enabled {
        match telemetry::spawn_diagnostics_reporter(Duration::from_secs(
            diagnostics.report_interval_secs,
        )) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("[Engine] Diagnostics reporter not started: {}", e);
                None
            }
        }
    } else {
        None
    };

    info!(
        "[Engine] Front-end started (indicator: {}, diagnostics: {})",
        indicator.is_some(),
        diagnostics.is_some()
    );

    Ok(FrontendHandles {
        detection,
        indicator,
        diagnostics,
    })
}
