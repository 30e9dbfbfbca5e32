//! Signal source adapter - the pull callback the classifier reads through
//!
//! Each pull blocks on the microphone until a full window of raw units is
//! available, then conditions it in one pass:
//!
//! ```text
//! raw u32 ──► high 16 bits ──► x gain ──► f32 window
//!                                  │
//!                                  └──► sum of squares ──► RMS ──► GainPolicy
//! ```
//!
//! The gain scalar lives here and is only touched from the detection task
//! that owns the adapter, so no synchronization is needed for it.

use tracing::{debug, warn};

use super::agc::GainPolicy;
use super::microphone::{extract_sample, Microphone, RAW_UNIT_BYTES};
use crate::config::AgcConfig;
use crate::error::AudioError;

/// Pull interface the streaming classifier uses to obtain samples
///
/// `get_data` must fill `out` completely or return an error; a partially
/// filled window is never handed to the classifier.
pub trait SignalSource {
    /// Number of samples the classifier expects per window
    fn total_length(&self) -> usize;

    /// Fill `out` with the next conditioned samples
    ///
    /// `offset` is the position of `out` within the classifier's window.
    fn get_data(&mut self, offset: usize, out: &mut [f32]) -> Result<(), AudioError>;
}

/// Per-window measurements reported after conditioning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// RMS of the scaled window
    pub rms: f32,
    /// Gain that will be applied to the next window
    pub next_gain: f32,
    /// Whether a scaled sample would have overflowed 16 bits
    pub saturated: bool,
}

/// Microphone-backed signal source applying adaptive gain
pub struct SignalAdapter<M: Microphone> {
    microphone: M,
    raw: Vec<u32>,
    total_length: usize,
    gain: f32,
    safe_gain: f32,
    policy: GainPolicy,
    last_rms: f32,
    windows: u64,
    saturation_faults: u64,
}

impl<M: Microphone> SignalAdapter<M> {
    /// Allocate the raw window buffer and set the initial gain
    ///
    /// # Errors
    /// `AudioError::BufferAllocationFailed` if the buffer cannot be reserved.
    pub fn new(microphone: M, window_len: usize, agc: &AgcConfig) -> Result<Self, AudioError> {
        let mut raw = Vec::new();
        raw.try_reserve_exact(window_len)
            .map_err(|_| AudioError::BufferAllocationFailed {
                bytes: window_len.saturating_mul(RAW_UNIT_BYTES),
            })?;
        raw.resize(window_len, 0);

        let policy = GainPolicy::from(agc);
        let gain = agc.initial_gain.clamp(policy.min_gain, policy.max_gain);

        Ok(Self {
            microphone,
            raw,
            total_length: window_len,
            gain,
            safe_gain: agc.safe_gain,
            policy,
            last_rms: 0.0,
            windows: 0,
            saturation_faults: 0,
        })
    }

    /// Bring up the acquisition hardware
    pub fn enable(&mut self) -> Result<(), AudioError> {
        self.microphone.enable()
    }

    /// Gain that will be applied to the next window
    pub fn current_gain(&self) -> f32 {
        self.gain
    }

    /// RMS of the most recent complete window
    pub fn last_rms(&self) -> f32 {
        self.last_rms
    }

    /// Number of windows conditioned so far
    pub fn windows(&self) -> u64 {
        self.windows
    }

    /// Number of windows in which the saturation guard fired
    pub fn saturation_faults(&self) -> u64 {
        self.saturation_faults
    }

    fn fill_raw(&mut self, len: usize) -> Result<(), AudioError> {
        let mut filled = 0;
        while filled < len {
            let read = self.microphone.read(&mut self.raw[filled..len])?;
            if read == 0 {
                return Err(AudioError::NoData {
                    requested: len,
                    received: filled,
                });
            }
            filled += read.min(len - filled);
        }
        Ok(())
    }

    /// Read one window from the microphone and condition it into `out`
    ///
    /// On error nothing is written to `out` and the gain is unchanged.
    pub fn condition_window(&mut self, out: &mut [f32]) -> Result<WindowStats, AudioError> {
        let len = out.len();
        if len > self.raw.len() {
            return Err(AudioError::InvalidWindow {
                requested: len,
                capacity: self.raw.len(),
            });
        }
        if len == 0 {
            return Ok(WindowStats {
                rms: self.last_rms,
                next_gain: self.gain,
                saturated: false,
            });
        }

        self.fill_raw(len)?;

        let max = f32::from(i16::MAX);
        let min = f32::from(i16::MIN);
        let mut saturated = false;
        let mut sum_squares = 0.0_f64;

        for (dst, &raw) in out.iter_mut().zip(&self.raw[..len]) {
            let sample = f32::from(extract_sample(raw));
            let product = sample * self.gain;
            if product > max || product < min {
                self.gain = self.safe_gain;
                saturated = true;
            }
            let scaled = (sample * self.gain).trunc().clamp(min, max);
            *dst = scaled;
            sum_squares += f64::from(scaled) * f64::from(scaled);
        }

        let rms = (sum_squares / len as f64).sqrt() as f32;
        self.last_rms = rms;
        self.windows += 1;

        if saturated {
            self.saturation_faults += 1;
            warn!(
                "[SignalAdapter] Saturation guard fired, gain reset to {:.2}",
                self.gain
            );
        } else {
            self.gain = self.policy.adjust(self.gain, rms);
        }
        debug!("[SignalAdapter] rms: {:.1}, gain: {:.4}", rms, self.gain);

        Ok(WindowStats {
            rms,
            next_gain: self.gain,
            saturated,
        })
    }
}

impl<M: Microphone> SignalSource for SignalAdapter<M> {
    fn total_length(&self) -> usize {
        self.total_length
    }

    fn get_data(&mut self, _offset: usize, out: &mut [f32]) -> Result<(), AudioError> {
        self.condition_window(out).map(|_| ())
    }
}
