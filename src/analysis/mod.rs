// Analysis module - detection loop driving the streaming classifier
//
// This module owns the high-priority side of the front-end: it pulls one
// classification cycle at a time from the external classifier (which reads
// its input window through the signal adapter) and turns the confidence
// vector into indicator events.
//
// Architecture:
// - DetectionLoop: Initializing (one-shot) then Running (forever)
// - Pipeline: Microphone → SignalAdapter (AGC) → StreamingClassifier → TriggerPolicy
// - Output: DetectionEvent via the bounded event channel to the indicator task

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::audio::{Microphone, SignalAdapter};
use crate::config::{AppConfig, DetectionConfig};
use crate::error::{
    log_audio_error, log_classifier_error, AudioError, ClassifierError, ErrorCode,
};
use crate::events::{DetectionEvent, EventSender, SendError};
use crate::telemetry;

pub mod classifier;

pub use classifier::{Classification, ClassificationResult, StreamingClassifier};

/// What the trigger policy wants done with one classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerDecision {
    /// Emit the informational listing of all class confidences
    pub log_predictions: bool,
    /// Event to enqueue for the indicator
    pub event: Option<DetectionEvent>,
}

/// Keyword trigger thresholds
///
/// Decision table:
/// - keyword > keyword_threshold                              → log predictions
/// - keyword > keyword_threshold AND noise < noise_threshold  → RaiseAlert
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerPolicy {
    pub keyword_index: usize,
    pub noise_index: usize,
    pub keyword_threshold: f32,
    pub noise_threshold: f32,
}

impl From<&DetectionConfig> for TriggerPolicy {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            keyword_index: config.keyword_index,
            noise_index: config.noise_index,
            keyword_threshold: config.keyword_threshold,
            noise_threshold: config.noise_threshold,
        }
    }
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self::from(&DetectionConfig::default())
    }
}

impl TriggerPolicy {
    /// Evaluate one result; a result missing either index yields nothing
    pub fn evaluate(&self, result: &ClassificationResult) -> TriggerDecision {
        let (Some(keyword), Some(noise)) = (
            result.confidence(self.keyword_index),
            result.confidence(self.noise_index),
        ) else {
            return TriggerDecision {
                log_predictions: false,
                event: None,
            };
        };

        let keyword_hit = keyword > self.keyword_threshold;
        TriggerDecision {
            log_predictions: keyword_hit,
            event: (keyword_hit && noise < self.noise_threshold).then_some(DetectionEvent::RaiseAlert),
        }
    }
}

/// Describe the keyword, noise and unknown classes the loop watches
pub fn class_summary(config: &DetectionConfig, labels: &[String]) -> String {
    let label_at = |idx: usize| labels.get(idx).map(String::as_str).unwrap_or("<missing>");
    format!(
        "keyword '{}' against noise '{}' (unknown '{}')",
        label_at(config.keyword_index),
        label_at(config.noise_index),
        label_at(config.unknown_index)
    )
}

/// Result of one `Running` iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Keyword below threshold
    Idle,
    /// Keyword above threshold but suppressed by background noise
    PredictionsLogged,
    /// RaiseAlert enqueued
    AlertQueued,
    /// RaiseAlert dropped because the channel stayed full
    AlertDropped,
    /// Classifier or signal fault; cycle skipped
    ClassifierFailed { code: i32 },
}

/// Running totals kept by the detection loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DetectionCounters {
    pub cycles: u64,
    pub classifier_faults: u64,
    pub alerts_sent: u64,
    pub alerts_dropped: u64,
}

/// Detection loop state after a successful `Initializing` phase
pub struct DetectionLoop<M: Microphone, C: StreamingClassifier> {
    adapter: SignalAdapter<M>,
    classifier: C,
    sender: EventSender,
    policy: TriggerPolicy,
    enqueue_timeout: Duration,
    counters: DetectionCounters,
    /// Set once the indicator side has gone away
    consumer_gone: bool,
}

impl<M: Microphone, C: StreamingClassifier> DetectionLoop<M, C> {
    /// Run the one-shot `Initializing` phase
    ///
    /// Validates the configuration, allocates the window buffer, sets the
    /// initial gain, enables the microphone and primes the classifier. Any
    /// error is fatal for the task.
    pub fn initialize(
        config: &AppConfig,
        microphone: M,
        mut classifier: C,
        sender: EventSender,
    ) -> Result<Self, ClassifierError> {
        config
            .validate()
            .map_err(|reason| ClassifierError::InitFailed { reason })?;
        let mut adapter = SignalAdapter::new(microphone, config.detection.frame_size, &config.agc)?;
        adapter.enable()?;
        classifier.init()?;

        info!(
            "[DetectionLoop] Initialized: window {} samples, gain {:.2}, labels [{}]",
            config.detection.frame_size,
            adapter.current_gain(),
            classifier.labels().join(", ")
        );
        info!(
            "[DetectionLoop] Watching {}",
            class_summary(&config.detection, classifier.labels())
        );

        Ok(Self {
            adapter,
            classifier,
            sender,
            policy: TriggerPolicy::from(&config.detection),
            enqueue_timeout: Duration::from_millis(config.detection.enqueue_timeout_ms),
            counters: DetectionCounters::default(),
            consumer_gone: false,
        })
    }

    pub fn counters(&self) -> DetectionCounters {
        self.counters
    }

    pub fn current_gain(&self) -> f32 {
        self.adapter.current_gain()
    }

    pub fn last_rms(&self) -> f32 {
        self.adapter.last_rms()
    }

    pub fn adapter(&self) -> &SignalAdapter<M> {
        &self.adapter
    }

    /// Whether the event consumer has disconnected
    pub fn consumer_gone(&self) -> bool {
        self.consumer_gone
    }

    /// Perform one `Running` iteration
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let hub = telemetry::hub();
        self.counters.cycles += 1;

        let outcome = match self.classifier.run_continuous(&mut self.adapter) {
            Ok(result) => self.dispatch(&result),
            Err(err) => {
                self.counters.classifier_faults += 1;
                hub.detection().record_fault();
                log_classifier_error(&err, "DetectionLoop::run_cycle");
                CycleOutcome::ClassifierFailed { code: err.code() }
            }
        };

        match outcome {
            CycleOutcome::AlertQueued => hub.detection().record_event_sent(),
            CycleOutcome::AlertDropped => hub.detection().record_event_dropped(),
            _ => {}
        }
        hub.beat(hub.detection());
        outcome
    }

    fn dispatch(&mut self, result: &ClassificationResult) -> CycleOutcome {
        let decision = self.policy.evaluate(result);
        if decision.log_predictions {
            info!("[DetectionLoop] Predictions: {}", result.predictions_line());
        }

        let Some(event) = decision.event else {
            return if decision.log_predictions {
                CycleOutcome::PredictionsLogged
            } else {
                CycleOutcome::Idle
            };
        };

        match self.sender.send_timeout(event, self.enqueue_timeout) {
            Ok(()) => {
                self.counters.alerts_sent += 1;
                CycleOutcome::AlertQueued
            }
            Err(SendError::Full(event)) => {
                self.counters.alerts_dropped += 1;
                debug!("[DetectionLoop] Event channel full, dropped {:?}", event);
                CycleOutcome::AlertDropped
            }
            Err(err @ SendError::Disconnected(_)) => {
                self.counters.alerts_dropped += 1;
                if self.consumer_gone {
                    debug!("[DetectionLoop] {}", err);
                } else {
                    self.consumer_gone = true;
                    warn!("[DetectionLoop] {}; further alerts are dropped", err);
                }
                CycleOutcome::AlertDropped
            }
        }
    }

    /// Run cycles forever
    pub fn run(mut self) -> ! {
        info!("[DetectionLoop] Entering detection loop");
        loop {
            self.run_cycle();
        }
    }
}

/// Detection task body: build the microphone, initialize, then loop
///
/// The microphone is constructed here, on the task's own thread, so
/// hardware handles that are not `Send` never cross threads. Returns only
/// if startup fails.
pub fn run_detection_task<M, C, F>(
    config: AppConfig,
    microphone_factory: F,
    classifier: C,
    sender: EventSender,
) where
    M: Microphone,
    C: StreamingClassifier,
    F: FnOnce() -> Result<M, AudioError>,
{
    let microphone = match microphone_factory() {
        Ok(microphone) => microphone,
        Err(err) => {
            log_audio_error(&err, "detection task startup");
            return;
        }
    };

    match DetectionLoop::initialize(&config, microphone, classifier, sender) {
        Ok(detection) => detection.run(),
        Err(err) => {
            log_classifier_error(&err, "DetectionLoop::initialize");
            tracing::error!("[DetectionLoop] Startup failed, detection task halted");
        }
    }
}
