use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::{SampleFormat, SampleRate, SupportedStreamConfig, SupportedStreamConfigRange};
use tracing::{error, info, warn};

use super::microphone::{pack_sample, Microphone};
use crate::error::AudioError;

/// Poll interval while the capture ring is empty
const READ_POLL: Duration = Duration::from_millis(1);

/// Live microphone backed by the default cpal input device.
///
/// The device is opened at the requested sample rate when it supports it;
/// otherwise its default rate is used and a warning is logged.
///
/// The input callback packs each sample of the first channel into a raw
/// transfer unit and pushes it through an rtrb ring; `read` drains the ring
/// on the detection task. `cpal::Stream` is not `Send`, so this type must be
/// constructed and enabled on the thread that reads from it.
pub struct CpalMicrophone {
    ring_capacity: usize,
    requested_rate: u32,
    stream: Option<cpal::Stream>,
    consumer: Option<rtrb::Consumer<u32>>,
    /// Units dropped because the ring was full
    overruns: Arc<AtomicU64>,
    sample_rate: u32,
}

impl CpalMicrophone {
    /// # Arguments
    /// * `ring_capacity` - Capture ring size in transfer units
    /// * `requested_rate` - Sample rate the classifier expects, in Hz
    pub fn new(ring_capacity: usize, requested_rate: u32) -> Self {
        Self {
            ring_capacity: ring_capacity.max(1),
            requested_rate,
            stream: None,
            consumer: None,
            overruns: Arc::new(AtomicU64::new(0)),
            sample_rate: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    fn create_input_stream(
        &mut self,
        mut producer: rtrb::Producer<u32>,
    ) -> Result<cpal::Stream, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::MicrophoneInitFailed {
                reason: "No default input device found".to_string(),
            })?;

        let supported = device
            .supported_input_configs()
            .map(|ranges| select_input_config(ranges, self.requested_rate))
            .unwrap_or_default();
        let config = match supported {
            Some(config) => config,
            None => {
                let config = device
                    .default_input_config()
                    .map_err(|e| AudioError::StreamOpenFailed {
                        reason: format!("Failed to get default input config: {:?}", e),
                    })?;
                warn!(
                    "[CpalMicrophone] Device cannot capture at {} Hz, using its default {} Hz",
                    self.requested_rate,
                    config.sample_rate().0
                );
                config
            }
        };

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels_count = (stream_config.channels as usize).max(1);
        self.sample_rate = stream_config.sample_rate.0;

        let err_fn = |err| error!("Input stream error: {}", err);
        let overruns = Arc::clone(&self.overruns);

        let stream = match config.sample_format() {
            SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels_count) {
                        if producer.push(pack_sample(frame[0])).is_err() {
                            overruns.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
                err_fn,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels_count) {
                        let sample = (frame[0].clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                        if producer.push(pack_sample(sample)).is_err() {
                            overruns.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
                err_fn,
                None,
            ),
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("Unsupported input sample format {:?}", other),
                })
            }
        }
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

        Ok(stream)
    }
}

/// Pick a supported input configuration at `rate` with a usable format
///
/// 16-bit integer capture is preferred over float; among equal formats the
/// fewest channels wins since only the first channel is kept.
pub fn select_input_config<I>(ranges: I, rate: u32) -> Option<SupportedStreamConfig>
where
    I: IntoIterator<Item = SupportedStreamConfigRange>,
{
    ranges
        .into_iter()
        .filter(|range| {
            matches!(range.sample_format(), SampleFormat::I16 | SampleFormat::F32)
                && range.min_sample_rate().0 <= rate
                && rate <= range.max_sample_rate().0
        })
        .min_by_key(|range| (range.sample_format() != SampleFormat::I16, range.channels()))
        .map(|range| range.with_sample_rate(SampleRate(rate)))
}

impl Microphone for CpalMicrophone {
    fn enable(&mut self) -> Result<(), AudioError> {
        let (producer, consumer) = rtrb::RingBuffer::new(self.ring_capacity);
        let stream = self.create_input_stream(producer)?;

        stream.play().map_err(|e| AudioError::MicrophoneInitFailed {
            reason: format!("Input start failed: {}", e),
        })?;

        info!(
            "[CpalMicrophone] Capture started at {} Hz (ring {} units)",
            self.sample_rate, self.ring_capacity
        );
        self.stream = Some(stream);
        self.consumer = Some(consumer);
        Ok(())
    }

    /// Blocks until at least one unit is available, then drains what is ready
    fn read(&mut self, raw: &mut [u32]) -> Result<usize, AudioError> {
        let consumer = self.consumer.as_mut().ok_or_else(|| AudioError::StreamFailure {
            reason: "capture read before enable".to_string(),
        })?;

        if raw.is_empty() {
            return Ok(0);
        }

        loop {
            if consumer.is_abandoned() && consumer.is_empty() {
                return Err(AudioError::StreamFailure {
                    reason: "capture stream closed".to_string(),
                });
            }

            let mut count = 0;
            while count < raw.len() {
                match consumer.pop() {
                    Ok(unit) => {
                        raw[count] = unit;
                        count += 1;
                    }
                    Err(_) => break,
                }
            }
            if count > 0 {
                return Ok(count);
            }
            thread::sleep(READ_POLL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            cpal::SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_select_input_config_matches_requested_rate() {
        let ranges = vec![
            range(2, 44_100, 48_000, SampleFormat::F32),
            range(2, 8_000, 48_000, SampleFormat::F32),
            range(1, 8_000, 48_000, SampleFormat::I16),
        ];
        let config = select_input_config(ranges, 16_000).unwrap();
        assert_eq!(config.sample_rate(), SampleRate(16_000));
        assert_eq!(config.sample_format(), SampleFormat::I16);
        assert_eq!(config.channels(), 1);
    }

    #[test]
    fn test_select_input_config_falls_back_to_float() {
        let ranges = vec![
            range(1, 44_100, 48_000, SampleFormat::I16),
            range(2, 8_000, 96_000, SampleFormat::F32),
        ];
        let config = select_input_config(ranges, 16_000).unwrap();
        assert_eq!(config.sample_format(), SampleFormat::F32);
    }

    #[test]
    fn test_select_input_config_rejects_unsupported_rate() {
        let ranges = vec![
            range(1, 44_100, 48_000, SampleFormat::I16),
            range(1, 8_000, 48_000, SampleFormat::U8),
        ];
        assert!(select_input_config(ranges, 16_000).is_none());
    }

    #[test]
    fn test_read_before_enable_fails() {
        let mut mic = CpalMicrophone::new(16, 16_000);
        let mut raw = [0_u32; 4];
        assert!(matches!(
            mic.read(&mut raw),
            Err(AudioError::StreamFailure { .. })
        ));
        assert_eq!(mic.overruns(), 0);
    }
}
