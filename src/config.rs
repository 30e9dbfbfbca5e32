//! Configuration management for the keyword-spotting front-end
//!
//! Runtime configuration is loaded from a JSON file so that gain policy,
//! trigger thresholds and indicator timing can be tuned without a rebuild.
//! Every field defaults to the values the device ships with; a missing or
//! malformed file falls back to those defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Upper bound on the detection task's wait for a free event slot
pub const MAX_ENQUEUE_TIMEOUT_MS: u64 = 1_000;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub agc: AgcConfig,
    pub detection: DetectionConfig,
    pub indicator: IndicatorConfig,
    pub scheduling: SchedulingConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Adaptive gain control parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgcConfig {
    /// Upper gain clamp
    pub max_gain: f32,
    /// Lower gain clamp
    pub min_gain: f32,
    /// Target RMS level in 16-bit sample units
    pub target_level: f32,
    /// Additive gain step
    pub step: f32,
    /// Weight of the previous gain in exponential smoothing (0..1)
    pub smoothing: f32,
    /// Gain forced when loudness exceeds 1.5x the target (before clamping)
    pub collapse_gain: f32,
    /// Gain at start-up
    pub initial_gain: f32,
    /// Neutral gain applied after a saturation fault
    pub safe_gain: f32,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            max_gain: 60.0,
            min_gain: 1.0,
            target_level: 3000.0,
            step: 1.0,
            smoothing: 0.75,
            collapse_gain: 0.5,
            initial_gain: 30.0,
            safe_gain: 1.0,
        }
    }
}

/// Detection loop and trigger policy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Number of samples the classifier pulls per window
    pub frame_size: usize,
    /// Sample rate of the acquisition hardware in Hz
    pub sample_rate: u32,
    /// Label index of the keyword class
    pub keyword_index: usize,
    /// Label index of the background noise class
    pub noise_index: usize,
    /// Label index of the unknown class
    pub unknown_index: usize,
    /// Keyword confidence above which predictions are listed and alerts considered
    pub keyword_threshold: f32,
    /// Noise confidence below which an alert is raised
    pub noise_threshold: f32,
    /// Bounded wait when enqueuing an indicator event
    pub enqueue_timeout_ms: u64,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            frame_size: 16_000,
            sample_rate: 16_000,
            keyword_index: 0,
            noise_index: 1,
            unknown_index: 2,
            keyword_threshold: 0.1,
            noise_threshold: 0.1,
            enqueue_timeout_ms: 2,
            event_capacity: 5,
        }
    }
}

/// Status indicator animation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Whether the indicator renders at all (disabled indicators are cleared)
    pub enabled: bool,
    /// Animation tick period in milliseconds
    pub tick_ms: u64,
    /// Pixel index driven on the indicator strip
    pub pixel_index: u32,
    /// Ramp reverses when it drops below this value
    pub ramp_min: u8,
    /// Ramp reverses when it rises above this value
    pub ramp_max: u8,
    /// Offset added to the ramp channel when rendering
    pub ramp_offset: u8,
    /// Per-tick decay of the event channels
    pub decay_step: u8,
    /// Intensity an event sets its channel to
    pub event_level: u8,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_ms: 70,
            pixel_index: 0,
            ramp_min: 1,
            ramp_max: 20,
            ramp_offset: 4,
            decay_step: 5,
            event_level: 255,
        }
    }
}

/// Task placement and priorities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Processing unit the detection task is pinned to
    pub detection_core: usize,
    /// Processing unit the indicator task is pinned to
    pub indicator_core: usize,
    /// Detection task priority (0-99, higher runs first)
    pub detection_priority: u8,
    /// Indicator task priority (0-99)
    pub indicator_priority: u8,
    /// Stack size of each task in bytes
    pub stack_size: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            detection_core: 0,
            indicator_core: 1,
            detection_priority: 80,
            indicator_priority: 40,
            stack_size: 256 * 1024,
        }
    }
}

/// Diagnostic headroom reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Whether the periodic reporter runs
    pub enabled: bool,
    /// Seconds between headroom reports
    pub report_interval_secs: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_interval_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file doesn't exist, its
    /// JSON is invalid or [`AppConfig::validate`] rejects it.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                        config
                    }
                    Err(reason) => {
                        log::warn!(
                            "[Config] Invalid values in {:?}: {}. Using defaults.",
                            path.as_ref(),
                            reason
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Check value ranges that parsing alone cannot enforce
    ///
    /// # Errors
    /// A human-readable reason naming the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        let agc = &self.agc;
        let gains = [
            ("agc.max_gain", agc.max_gain),
            ("agc.min_gain", agc.min_gain),
            ("agc.target_level", agc.target_level),
            ("agc.step", agc.step),
            ("agc.smoothing", agc.smoothing),
            ("agc.collapse_gain", agc.collapse_gain),
            ("agc.initial_gain", agc.initial_gain),
            ("agc.safe_gain", agc.safe_gain),
        ];
        if let Some((name, value)) = gains.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(format!("{} must be finite and non-negative, got {}", name, value));
        }
        if agc.min_gain > agc.max_gain {
            return Err(format!(
                "agc.min_gain {} exceeds agc.max_gain {}",
                agc.min_gain, agc.max_gain
            ));
        }
        if agc.smoothing > 1.0 {
            return Err(format!("agc.smoothing {} out of range [0, 1]", agc.smoothing));
        }

        let detection = &self.detection;
        if detection.frame_size == 0 {
            return Err("detection.frame_size must be at least 1".to_string());
        }
        if detection.event_capacity == 0 {
            return Err("detection.event_capacity must be at least 1".to_string());
        }
        if !detection.keyword_threshold.is_finite() || !detection.noise_threshold.is_finite() {
            return Err("detection thresholds must be finite".to_string());
        }
        if detection.enqueue_timeout_ms > MAX_ENQUEUE_TIMEOUT_MS {
            return Err(format!(
                "detection.enqueue_timeout_ms {} exceeds {}",
                detection.enqueue_timeout_ms, MAX_ENQUEUE_TIMEOUT_MS
            ));
        }

        let indicator = &self.indicator;
        if indicator.tick_ms == 0 {
            return Err("indicator.tick_ms must be at least 1".to_string());
        }
        if indicator.ramp_min > indicator.ramp_max {
            return Err(format!(
                "indicator.ramp_min {} exceeds indicator.ramp_max {}",
                indicator.ramp_min, indicator.ramp_max
            ));
        }

        if self.diagnostics.enabled && self.diagnostics.report_interval_secs == 0 {
            return Err("diagnostics.report_interval_secs must be at least 1".to_string());
        }

        Ok(())
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file("assets/kws_config.json")
    }
}
