// Audio module - microphone acquisition, gain control and window conditioning

pub mod agc;
pub mod capture;
pub mod microphone;
pub mod signal;
pub mod sources;

// Re-export commonly used types for convenience
pub use agc::{adjust_gain, GainPolicy};
pub use capture::CpalMicrophone;
pub use microphone::{extract_sample, pack_sample, Microphone};
pub use signal::{SignalAdapter, SignalSource, WindowStats};
pub use sources::{SyntheticMicrophone, SyntheticPattern, WavMicrophone};
