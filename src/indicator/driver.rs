use serde::{Deserialize, Serialize};
use tracing::trace;

/// Three-channel indicator color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Addressable indicator hardware
///
/// Steady-state calls are infallible; acquiring the hardware happens in a
/// factory that may fail, inside the indicator task.
pub trait IndicatorDriver {
    /// Stage a color for one pixel; shown on the next `refresh`
    fn set_pixel(&mut self, index: u32, r: u8, g: u8, b: u8);
    /// Push staged pixels to the hardware
    fn refresh(&mut self);
    /// Turn every pixel off immediately
    fn clear(&mut self);
}

impl<D: IndicatorDriver + ?Sized> IndicatorDriver for Box<D> {
    fn set_pixel(&mut self, index: u32, r: u8, g: u8, b: u8) {
        (**self).set_pixel(index, r, g, b)
    }

    fn refresh(&mut self) {
        (**self).refresh()
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}

/// Desktop stand-in for an addressable LED strip
///
/// Rendered frames are logged at `trace` and the last one is kept for
/// inspection.
#[derive(Debug)]
pub struct LogIndicatorDriver {
    staged: Vec<Rgb>,
    shown: Vec<Rgb>,
    refreshes: u64,
    clears: u64,
}

impl LogIndicatorDriver {
    pub fn new(pixel_count: usize) -> Self {
        let pixel_count = pixel_count.max(1);
        Self {
            staged: vec![Rgb::OFF; pixel_count],
            shown: vec![Rgb::OFF; pixel_count],
            refreshes: 0,
            clears: 0,
        }
    }

    /// Color currently shown on `index`
    pub fn pixel(&self, index: u32) -> Option<Rgb> {
        self.shown.get(index as usize).copied()
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    pub fn clears(&self) -> u64 {
        self.clears
    }
}

impl Default for LogIndicatorDriver {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IndicatorDriver for LogIndicatorDriver {
    fn set_pixel(&mut self, index: u32, r: u8, g: u8, b: u8) {
        if let Some(pixel) = self.staged.get_mut(index as usize) {
            *pixel = Rgb { r, g, b };
        }
    }

    fn refresh(&mut self) {
        self.shown.copy_from_slice(&self.staged);
        self.refreshes += 1;
        trace!("[Indicator] frame {:?}", self.shown);
    }

    fn clear(&mut self) {
        self.staged.fill(Rgb::OFF);
        self.shown.fill(Rgb::OFF);
        self.clears += 1;
        trace!("[Indicator] cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_pixels_show_after_refresh() {
        let mut driver = LogIndicatorDriver::new(2);
        driver.set_pixel(1, 10, 20, 30);
        assert_eq!(driver.pixel(1), Some(Rgb::OFF));
        driver.refresh();
        assert_eq!(driver.pixel(1), Some(Rgb::new(10, 20, 30)));
        assert_eq!(driver.refreshes(), 1);
    }

    #[test]
    fn test_out_of_range_pixel_is_ignored() {
        let mut driver = LogIndicatorDriver::default();
        driver.set_pixel(7, 1, 1, 1);
        driver.refresh();
        assert_eq!(driver.pixel(0), Some(Rgb::OFF));
        assert_eq!(driver.pixel(7), None);
    }

    #[test]
    fn test_clear_turns_everything_off() {
        let mut driver = LogIndicatorDriver::default();
        driver.set_pixel(0, 255, 0, 0);
        driver.refresh();
        driver.clear();
        assert_eq!(driver.pixel(0), Some(Rgb::OFF));
        assert_eq!(driver.clears(), 1);
    }
}
