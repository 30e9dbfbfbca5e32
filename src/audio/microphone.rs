//! Microphone abstraction consumed by the signal source adapter
//!
//! The hardware delivers fixed-width 32-bit transfer units; the usable
//! 16-bit sample sits in the high half of each unit and the low half is
//! padding. Implementations block until data is available.

use crate::error::AudioError;

/// Width of one raw transfer unit in bytes
pub const RAW_UNIT_BYTES: usize = std::mem::size_of::<u32>();

/// Blocking microphone interface
///
/// `enable` is called once while the detection task initializes and any
/// error there is fatal. `read` may block indefinitely; it returns the
/// number of raw units written to the front of `raw`.
pub trait Microphone {
    fn enable(&mut self) -> Result<(), AudioError>;
    fn read(&mut self, raw: &mut [u32]) -> Result<usize, AudioError>;
}

impl<M: Microphone + ?Sized> Microphone for Box<M> {
    fn enable(&mut self) -> Result<(), AudioError> {
        (**self).enable()
    }

    fn read(&mut self, raw: &mut [u32]) -> Result<usize, AudioError> {
        (**self).read(raw)
    }
}

/// Extract the usable signed sample from a raw transfer unit
#[inline]
pub fn extract_sample(raw: u32) -> i16 {
    (raw >> 16) as u16 as i16
}

/// Pack a signed sample into a raw transfer unit (high 16 bits)
#[inline]
pub fn pack_sample(sample: i16) -> u32 {
    (sample as u16 as u32) << 16
}
