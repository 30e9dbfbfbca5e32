//! Adaptive gain control policy
//!
//! Maps (current gain, measured loudness) to the next gain. The policy is a
//! stepped controller with a hard collapse for very loud input, followed by
//! a clamp and exponential smoothing:
//!
//! 1. loudness > 1.5 x target  -> gain = collapse value (hard reset)
//! 2. loudness > target        -> gain -= step
//! 3. loudness < target / 2    -> gain += step
//! 4. otherwise                -> unchanged
//!
//! then `clamp(min, max)` and `next = clamped * (1 - a) + current * a`.
//!
//! Pure functions only: no I/O and no state beyond the scalar passed in.

use crate::config::AgcConfig;

/// Upper gain clamp
pub const AGC_MAX_GAIN: f32 = 60.0;
/// Lower gain clamp
pub const AGC_MIN_GAIN: f32 = 1.0;
/// Target RMS level in 16-bit sample units
pub const TARGET_LEVEL: f32 = 3000.0;
/// Gain adjustment step
pub const AGC_STEP: f32 = 1.0;
/// Weight of the previous gain in the smoothed result
pub const SMOOTHING_FACTOR: f32 = 0.75;
/// Gain forced when loudness exceeds 1.5x the target
pub const COLLAPSE_GAIN: f32 = 0.5;
/// Neutral gain applied after a saturation fault
pub const SAFE_GAIN: f32 = 1.0;
/// Gain at start-up
pub const INITIAL_GAIN: f32 = 30.0;

/// Gain policy parameters
///
/// Built from [`AgcConfig`]; the `Default` instance carries the shipped
/// constants above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainPolicy {
    pub max_gain: f32,
    pub min_gain: f32,
    pub target_level: f32,
    pub step: f32,
    pub smoothing: f32,
    pub collapse_gain: f32,
}

impl Default for GainPolicy {
    fn default() -> Self {
        Self {
            max_gain: AGC_MAX_GAIN,
            min_gain: AGC_MIN_GAIN,
            target_level: TARGET_LEVEL,
            step: AGC_STEP,
            smoothing: SMOOTHING_FACTOR,
            collapse_gain: COLLAPSE_GAIN,
        }
    }
}

impl From<&AgcConfig> for GainPolicy {
    fn from(config: &AgcConfig) -> Self {
        Self {
            max_gain: config.max_gain,
            min_gain: config.min_gain,
            target_level: config.target_level,
            step: config.step,
            smoothing: config.smoothing.clamp(0.0, 1.0),
            collapse_gain: config.collapse_gain,
        }
    }
}

impl GainPolicy {
    /// Stepped target before smoothing, already clamped to `[min, max]`
    pub fn stepped(&self, current_gain: f32, loudness: f32) -> f32 {
        let loudness = f64::from(loudness);
        let target = f64::from(self.target_level);

        let gain = if loudness > 1.5 * target {
            self.collapse_gain
        } else if loudness > target {
            current_gain - self.step
        } else if loudness < target / 2.0 {
            current_gain + self.step
        } else {
            current_gain
        };

        gain.clamp(self.min_gain, self.max_gain)
    }

    /// Compute the next gain for a measured loudness
    ///
    /// Smoothing is evaluated in double precision and narrowed to `f32`.
    pub fn adjust(&self, current_gain: f32, loudness: f32) -> f32 {
        let clamped = f64::from(self.stepped(current_gain, loudness));
        let alpha = f64::from(self.smoothing);

        (clamped * (1.0 - alpha) + f64::from(current_gain) * alpha) as f32
    }
}

/// Compute the next gain with the shipped policy constants
///
/// # Arguments
/// * `current_gain` - Gain applied to the window that was just measured
/// * `measured_loudness` - RMS of that window (non-negative)
///
/// # Returns
/// Next gain, within `[AGC_MIN_GAIN, AGC_MAX_GAIN]` whenever `current_gain`
/// is in that range.
pub fn adjust_gain(current_gain: f32, measured_loudness: f32) -> f32 {
    GainPolicy::default().adjust(current_gain, measured_loudness)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_result_stays_in_range() {
        let loudness = [
            0.0, 1.0, 100.0, 1499.0, 1500.0, 2000.0, 3000.0, 3001.0, 4500.0, 4501.0, 32767.0,
            1.0e9,
        ];
        let mut gain = AGC_MIN_GAIN;
        while gain <= AGC_MAX_GAIN {
            for &l in &loudness {
                let next = adjust_gain(gain, l);
                assert!(
                    (AGC_MIN_GAIN..=AGC_MAX_GAIN).contains(&next),
                    "gain {} loudness {} -> {}",
                    gain,
                    l,
                    next
                );
            }
            gain += 0.25;
        }
    }

    #[test]
    fn test_quiet_input_steps_up_with_smoothing() {
        // 10 + 1 = 11, smoothed: 11 * 0.25 + 10 * 0.75 = 10.25
        assert!((adjust_gain(10.0, 100.0) - 10.25).abs() < EPS);
    }

    #[test]
    fn test_loud_input_steps_down_with_smoothing() {
        // 10 - 1 = 9, smoothed: 9 * 0.25 + 10 * 0.75 = 9.75
        assert!((adjust_gain(10.0, 3500.0) - 9.75).abs() < EPS);
    }

    #[test]
    fn test_in_band_input_is_unchanged() {
        assert_eq!(adjust_gain(10.0, 1500.0), 10.0);
        assert_eq!(adjust_gain(10.0, 2000.0), 10.0);
        assert_eq!(adjust_gain(10.0, 3000.0), 10.0);
    }

    #[test]
    fn test_very_loud_input_collapses_then_clamps() {
        let policy = GainPolicy::default();
        // Collapse to 0.5 is clamped up to the floor
        assert_eq!(policy.stepped(30.0, 6000.0), AGC_MIN_GAIN);
        // 1.0 * 0.25 + 30 * 0.75 = 22.75
        assert!((adjust_gain(30.0, 6000.0) - 22.75).abs() < EPS);
    }

    #[test]
    fn test_step_up_is_capped_at_max() {
        assert_eq!(GainPolicy::default().stepped(AGC_MAX_GAIN, 0.0), AGC_MAX_GAIN);
        assert_eq!(adjust_gain(AGC_MAX_GAIN, 0.0), AGC_MAX_GAIN);
    }

    #[test]
    fn test_loud_sequence_descends_towards_floor() {
        let mut gain = 30.0;
        let mut previous = gain;
        for _ in 0..3 {
            gain = adjust_gain(gain, 6000.0);
            assert!(gain < previous);
            assert!(gain >= AGC_MIN_GAIN);
            previous = gain;
        }
        // 22.75 -> 17.3125 -> 13.234375
        assert!((gain - 13.234375).abs() < EPS);

        for _ in 0..200 {
            gain = adjust_gain(gain, 6000.0);
            assert!(gain >= AGC_MIN_GAIN);
        }
        assert!((gain - AGC_MIN_GAIN).abs() < EPS);
    }

    #[test]
    fn test_smoothing_reduces_change_versus_raw_step() {
        let policy = GainPolicy::default();
        for &(gain, loudness) in &[(10.0, 100.0), (10.0, 3500.0), (30.0, 6000.0), (2.0, 0.0)] {
            let raw = policy.stepped(gain, loudness);
            let smoothed = policy.adjust(gain, loudness);
            assert!((smoothed - gain).abs() < (raw - gain).abs());
            assert!((raw - gain).abs() <= policy.step || loudness > 1.5 * TARGET_LEVEL);
        }
    }

    #[test]
    fn test_steady_target_level_is_fixed_point() {
        let mut gain = 17.3;
        for _ in 0..100 {
            let next = adjust_gain(gain, TARGET_LEVEL);
            assert!((next - gain).abs() < EPS);
            gain = next;
        }
        assert!((gain - 17.3).abs() < EPS);
    }

    #[test]
    fn test_policy_from_config() {
        let config = AgcConfig {
            smoothing: 1.5,
            ..AgcConfig::default()
        };
        let policy = GainPolicy::from(&config);
        assert_eq!(policy.smoothing, 1.0);
        assert_eq!(policy.max_gain, 60.0);
    }
}
