// Status indicator - low-priority animation task
//
// Runs on its own fixed period, independent of detection cadence. Each tick:
// 1. Poll the event channel once (absence of an event is not an error)
// 2. Apply the event: RaiseAlert → red to max, RaiseWarn → green to max,
//    ramp restarts from its minimum going up
// 3. Advance the animation: ramp bounces between its bounds, red and green
//    decay toward zero
// 4. Render (r, g, ramp + offset), or clear the strip when disabled

use std::thread;
use std::time::Duration;

use tracing::info;

use crate::config::IndicatorConfig;
use crate::error::{log_indicator_error, IndicatorError};
use crate::events::{DetectionEvent, EventReceiver};
use crate::telemetry;

pub mod driver;

pub use driver::{IndicatorDriver, LogIndicatorDriver, Rgb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampDirection {
    Ascending,
    Descending,
}

/// Animation state for the single status pixel
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorState {
    config: IndicatorConfig,
    red: u8,
    green: u8,
    ramp: i16,
    direction: RampDirection,
}

impl IndicatorState {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            config,
            red: 0,
            green: 0,
            ramp: 0,
            direction: RampDirection::Descending,
        }
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn ramp(&self) -> i16 {
        self.ramp
    }

    pub fn direction(&self) -> RampDirection {
        self.direction
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn apply_event(&mut self, event: DetectionEvent) {
        match event {
            DetectionEvent::RaiseAlert => self.red = self.config.event_level,
            DetectionEvent::RaiseWarn => self.green = self.config.event_level,
        }
        self.ramp = i16::from(self.config.ramp_min);
        self.direction = RampDirection::Ascending;
    }

    /// Advance one animation step
    pub fn advance(&mut self) {
        let min = i16::from(self.config.ramp_min);
        let max = i16::from(self.config.ramp_max);
        if self.ramp < min || self.ramp > max {
            self.direction = match self.direction {
                RampDirection::Ascending => RampDirection::Descending,
                RampDirection::Descending => RampDirection::Ascending,
            };
        }
        self.ramp += match self.direction {
            RampDirection::Ascending => 1,
            RampDirection::Descending => -1,
        };

        self.red = self.red.saturating_sub(self.config.decay_step);
        self.green = self.green.saturating_sub(self.config.decay_step);
    }

    /// Color to render, `None` when the indicator is disabled
    pub fn frame(&self) -> Option<Rgb> {
        if !self.config.enabled {
            return None;
        }
        let blue = (self.ramp + i16::from(self.config.ramp_offset)).clamp(0, 255) as u8;
        Some(Rgb::new(self.red, self.green, blue))
    }
}

/// Indicator task: owns the driver and the consumer half of the channel
pub struct IndicatorTask<D: IndicatorDriver> {
    state: IndicatorState,
    driver: D,
    receiver: EventReceiver,
    pixel_index: u32,
    period: Duration,
    ticks: u64,
}

impl<D: IndicatorDriver> IndicatorTask<D> {
    pub fn new(config: IndicatorConfig, driver: D, receiver: EventReceiver) -> Self {
        Self {
            state: IndicatorState::new(config),
            driver,
            receiver,
            pixel_index: config.pixel_index,
            period: Duration::from_millis(config.tick_ms.max(1)),
            ticks: 0,
        }
    }

    pub fn state(&self) -> &IndicatorState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut IndicatorState {
        &mut self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Poll, apply, advance, render; returns the rendered color
    pub fn tick(&mut self) -> Option<Rgb> {
        if let Some(event) = self.receiver.try_recv() {
            self.state.apply_event(event);
        }

        let frame = if self.state.is_enabled() {
            self.state.advance();
            self.state.frame()
        } else {
            None
        };

        match frame {
            Some(color) => {
                self.driver
                    .set_pixel(self.pixel_index, color.r, color.g, color.b);
                self.driver.refresh();
            }
            None => self.driver.clear(),
        }

        self.ticks += 1;
        let hub = telemetry::hub();
        hub.beat(hub.indicator());
        frame
    }

    /// Tick forever at the configured period
    pub fn run(mut self) -> ! {
        info!(
            "[Indicator] Animation running every {} ms",
            self.period.as_millis()
        );
        loop {
            self.tick();
            thread::sleep(self.period);
        }
    }
}

/// Indicator task body: acquire the driver, then animate forever
///
/// Returns only if the hardware cannot be acquired.
pub fn run_indicator_task<D, F>(config: IndicatorConfig, driver_factory: F, receiver: EventReceiver)
where
    D: IndicatorDriver,
    F: FnOnce() -> Result<D, IndicatorError>,
{
    match driver_factory() {
        Ok(driver) => IndicatorTask::new(config, driver, receiver).run(),
        Err(err) => {
            log_indicator_error(&err, "indicator task startup");
            tracing::error!("[Indicator] Hardware unavailable, indicator task halted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{event_channel, EventSender, EVENT_CHANNEL_CAPACITY};

    fn task() -> (IndicatorTask<LogIndicatorDriver>, EventSender) {
        let (tx, rx) = event_channel(EVENT_CHANNEL_CAPACITY);
        (
            IndicatorTask::new(IndicatorConfig::default(), LogIndicatorDriver::default(), rx),
            tx,
        )
    }

    #[test]
    fn test_initial_frame_is_dim_ramp_only() {
        let state = IndicatorState::new(IndicatorConfig::default());
        assert_eq!(state.frame(), Some(Rgb::new(0, 0, 4)));
        assert_eq!(state.direction(), RampDirection::Descending);
    }

    #[test]
    fn test_ramp_bounces_between_bounds() {
        let mut state = IndicatorState::new(IndicatorConfig::default());
        let mut ramps = Vec::new();
        for _ in 0..60 {
            state.advance();
            ramps.push(state.ramp());
        }
        // Starts below the minimum, so it turns upward immediately
        assert_eq!(&ramps[..3], &[1, 2, 3]);
        assert_eq!(ramps.iter().copied().max(), Some(21));
        assert_eq!(ramps.iter().copied().min(), Some(0));
        let peak = ramps.iter().position(|&r| r == 21).unwrap();
        assert_eq!(ramps[peak + 1], 20);
    }

    #[test]
    fn test_alert_sets_red_and_restarts_ramp() {
        let mut state = IndicatorState::new(IndicatorConfig::default());
        for _ in 0..10 {
            state.advance();
        }
        state.apply_event(DetectionEvent::RaiseAlert);
        assert_eq!(state.red(), 255);
        assert_eq!(state.green(), 0);
        assert_eq!(state.ramp(), 1);
        assert_eq!(state.direction(), RampDirection::Ascending);
    }

    #[test]
    fn test_warn_sets_green() {
        let mut state = IndicatorState::new(IndicatorConfig::default());
        state.apply_event(DetectionEvent::RaiseWarn);
        assert_eq!(state.green(), 255);
        assert_eq!(state.red(), 0);
    }

    #[test]
    fn test_alert_decays_by_fixed_step_while_ramp_keeps_moving() {
        let (mut task, mut tx) = task();
        tx.try_send(DetectionEvent::RaiseAlert).unwrap();

        let first = task.tick().unwrap();
        assert_eq!(first.r, 250);

        let mut previous = first;
        let mut blues = vec![first.b];
        for _ in 0..20 {
            let frame = task.tick().unwrap();
            assert_eq!(previous.r - frame.r, 5);
            assert_eq!(frame.g, 0);
            blues.push(frame.b);
            previous = frame;
        }
        assert_eq!(previous.r, 150);
        assert!(blues.windows(2).all(|w| w[0] != w[1]));

        for _ in 0..30 {
            task.tick();
        }
        assert_eq!(task.state().red(), 0);
        task.tick();
        assert_eq!(task.state().red(), 0);
        assert_eq!(task.ticks(), 52);
    }

    #[test]
    fn test_tick_renders_through_driver() {
        let (mut task, _tx) = task();
        let frame = task.tick();
        assert_eq!(task.driver().pixel(0), frame);
        assert_eq!(task.driver().refreshes(), 1);
    }

    #[test]
    fn test_one_event_is_consumed_per_tick() {
        let (mut task, mut tx) = task();
        tx.try_send(DetectionEvent::RaiseWarn).unwrap();
        tx.try_send(DetectionEvent::RaiseAlert).unwrap();

        let frame = task.tick().unwrap();
        assert_eq!((frame.r, frame.g), (0, 250));
        let frame = task.tick().unwrap();
        assert_eq!((frame.r, frame.g), (250, 245));
    }

    #[test]
    fn test_disabled_indicator_is_cleared_and_frozen() {
        let (mut task, mut tx) = task();
        task.tick();

        task.state_mut().set_enabled(false);
        tx.try_send(DetectionEvent::RaiseAlert).unwrap();
        assert_eq!(task.tick(), None);
        assert_eq!(task.driver().pixel(0), Some(Rgb::OFF));
        assert_eq!(task.driver().clears(), 1);
        // Event still drained and applied, but no animation step
        assert_eq!(task.state().red(), 255);
        assert_eq!(task.state().ramp(), 1);

        task.tick();
        assert_eq!(task.state().red(), 255);
    }

    #[test]
    fn test_driver_factory_failure_returns() {
        let (_tx, rx) = event_channel(EVENT_CHANNEL_CAPACITY);
        run_indicator_task(
            IndicatorConfig::default(),
            || -> Result<LogIndicatorDriver, IndicatorError> {
                Err(IndicatorError::HardwareInitFailed {
                    reason: "no strip".to_string(),
                })
            },
            rx,
        );
    }
}
