//! Desktop microphone sources for replay and deterministic runs.
//!
//! Both sources deliver raw 32-bit transfer units with the sample in the
//! high half, exactly like the capture hardware, so the signal adapter
//! path is identical whether the input is live, a WAV file or synthetic.

use std::f32::consts::PI;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::microphone::{pack_sample, Microphone};
use crate::error::AudioError;

/// Replays a WAV file in a loop as raw transfer units.
///
/// With pacing enabled each read sleeps until the file's sample clock has
/// caught up, emulating a hardware read that blocks on the bus.
pub struct WavMicrophone {
    samples: Vec<i16>,
    sample_rate: u32,
    cursor: usize,
    paced: bool,
    started: Option<Instant>,
    delivered: u64,
}

impl WavMicrophone {
    /// Decode `path` to mono 16-bit samples
    pub fn open(path: &Path, paced: bool) -> Result<Self, AudioError> {
        let (samples, sample_rate) = read_wav(path)?;
        Ok(Self {
            samples,
            sample_rate,
            cursor: 0,
            paced,
            started: None,
            delivered: 0,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn pace(&self, started: Instant) {
        let due = Duration::from_secs_f64(self.delivered as f64 / self.sample_rate.max(1) as f64);
        let elapsed = started.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }
    }
}

impl Microphone for WavMicrophone {
    fn enable(&mut self) -> Result<(), AudioError> {
        if self.samples.is_empty() {
            return Err(AudioError::MicrophoneInitFailed {
                reason: "WAV source contains no samples".to_string(),
            });
        }
        self.started = Some(Instant::now());
        Ok(())
    }

    fn read(&mut self, raw: &mut [u32]) -> Result<usize, AudioError> {
        let started = self.started.ok_or_else(|| AudioError::StreamFailure {
            reason: "WAV source read before enable".to_string(),
        })?;

        for unit in raw.iter_mut() {
            *unit = pack_sample(self.samples[self.cursor]);
            self.cursor = (self.cursor + 1) % self.samples.len();
        }
        self.delivered += raw.len() as u64;

        if self.paced {
            self.pace(started);
        }
        Ok(raw.len())
    }
}

/// Supported deterministic waveform patterns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticPattern {
    Silence,
    Sine,
    Square,
    WhiteNoise,
}

/// Generates samples procedurally; never blocks.
pub struct SyntheticMicrophone {
    pattern: SyntheticPattern,
    amplitude: f32,
    frequency_hz: f32,
    sample_rate: u32,
    phase: f32,
    rng: StdRng,
}

impl SyntheticMicrophone {
    /// # Arguments
    /// * `pattern` - Waveform to generate
    /// * `amplitude` - Peak amplitude in 16-bit sample units
    /// * `frequency_hz` - Tone frequency (ignored for noise and silence)
    /// * `sample_rate` - Nominal sample rate in Hz
    pub fn new(pattern: SyntheticPattern, amplitude: f32, frequency_hz: f32, sample_rate: u32) -> Self {
        Self {
            pattern,
            amplitude: amplitude.clamp(0.0, f32::from(i16::MAX)),
            frequency_hz: frequency_hz.max(1.0),
            sample_rate: sample_rate.max(1),
            phase: 0.0,
            rng: StdRng::seed_from_u64(0x5A5A_FFF0),
        }
    }

    /// Constant-amplitude sine at 440 Hz
    pub fn sine(amplitude: f32, sample_rate: u32) -> Self {
        Self::new(SyntheticPattern::Sine, amplitude, 440.0, sample_rate)
    }

    fn advance_phase(&mut self) {
        self.phase += self.frequency_hz / self.sample_rate as f32;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
    }

    fn next_sample(&mut self) -> i16 {
        let value = match self.pattern {
            SyntheticPattern::Silence => 0.0,
            SyntheticPattern::Sine => {
                let value = (2.0 * PI * self.phase).sin() * self.amplitude;
                self.advance_phase();
                value
            }
            SyntheticPattern::Square => {
                let value = if self.phase < 0.5 {
                    self.amplitude
                } else {
                    -self.amplitude
                };
                self.advance_phase();
                value
            }
            SyntheticPattern::WhiteNoise => {
                if self.amplitude > 0.0 {
                    self.rng.gen_range(-self.amplitude..self.amplitude)
                } else {
                    0.0
                }
            }
        };
        value as i16
    }
}

impl Microphone for SyntheticMicrophone {
    fn enable(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn read(&mut self, raw: &mut [u32]) -> Result<usize, AudioError> {
        for unit in raw.iter_mut() {
            *unit = pack_sample(self.next_sample());
        }
        Ok(raw.len())
    }
}

fn read_wav(path: &Path) -> Result<(Vec<i16>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| AudioError::StreamOpenFailed {
        reason: format!("failed to open {}: {err}", path.display()),
    })?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::StreamOpenFailed {
            reason: format!("{} has zero channels", path.display()),
        });
    }

    let read_err = |err: hound::Error| AudioError::StreamFailure {
        reason: format!("error reading {}: {err}", path.display()),
    };

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| {
                sample
                    .map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
                    .map_err(read_err)
            })
            .collect::<Result<Vec<i16>, _>>()?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            16 => reader
                .samples::<i16>()
                .map(|sample| sample.map_err(read_err))
                .collect::<Result<Vec<i16>, _>>()?,
            bits @ (24 | 32) => reader
                .samples::<i32>()
                .map(|sample| sample.map(|v| (v >> (bits - 16)) as i16).map_err(read_err))
                .collect::<Result<Vec<i16>, _>>()?,
            bits => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!(
                        "unsupported bits_per_sample={} for {}",
                        bits,
                        path.display()
                    ),
                })
            }
        },
    };

    // Keep the first channel only, like a mono left-slot capture
    let channels = spec.channels as usize;
    let mono = if channels == 1 {
        samples
    } else {
        samples.chunks(channels).map(|frame| frame[0]).collect()
    };

    Ok((mono, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::microphone::extract_sample;

    #[test]
    fn test_silence_is_zero() {
        let mut mic = SyntheticMicrophone::new(SyntheticPattern::Silence, 1000.0, 440.0, 16_000);
        let mut raw = [0xFFFF_FFFF_u32; 16];
        assert_eq!(mic.read(&mut raw).unwrap(), 16);
        assert!(raw.iter().all(|&unit| extract_sample(unit) == 0));
    }

    #[test]
    fn test_square_alternates_at_amplitude() {
        let mut mic = SyntheticMicrophone::new(SyntheticPattern::Square, 1000.0, 4000.0, 16_000);
        let mut raw = [0_u32; 4];
        mic.read(&mut raw).unwrap();
        let samples: Vec<i16> = raw.iter().map(|&u| extract_sample(u)).collect();
        assert_eq!(samples, vec![1000, 1000, -1000, -1000]);
    }

    #[test]
    fn test_noise_is_deterministic_and_bounded() {
        let mut a = SyntheticMicrophone::new(SyntheticPattern::WhiteNoise, 500.0, 1.0, 16_000);
        let mut b = SyntheticMicrophone::new(SyntheticPattern::WhiteNoise, 500.0, 1.0, 16_000);
        let mut raw_a = [0_u32; 64];
        let mut raw_b = [0_u32; 64];
        a.read(&mut raw_a).unwrap();
        b.read(&mut raw_b).unwrap();
        assert_eq!(raw_a, raw_b);
        assert!(raw_a.iter().all(|&u| extract_sample(u).abs() <= 500));
    }

    #[test]
    fn test_missing_wav_fails_to_open() {
        let result = WavMicrophone::open(Path::new("/nonexistent/input.wav"), false);
        assert!(matches!(result, Err(AudioError::StreamOpenFailed { .. })));
    }

    #[test]
    fn test_wav_replays_in_a_loop() {
        let path = std::env::temp_dir().join(format!("kws_wav_loop_{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        {
            let mut writer = hound::WavWriter::create(&path, spec).unwrap();
            for s in [10_i16, -20, 30] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let mut mic = WavMicrophone::open(&path, false).unwrap();
        assert_eq!(mic.len(), 3);
        let mut raw = [0_u32; 5];
        assert!(mic.read(&mut raw).is_err(), "read before enable must fail");
        mic.enable().unwrap();
        mic.read(&mut raw).unwrap();
        let samples: Vec<i16> = raw.iter().map(|&u| extract_sample(u)).collect();
        assert_eq!(samples, vec![10, -20, 30, 10, -20]);

        let _ = std::fs::remove_file(&path);
    }
}
