//! Clocks the synchronization engine schedules against
//!
//! All times are seconds in the audio subsystem's clock domain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current audio time
pub trait AudioClock {
    /// Current time in seconds
    fn now(&self) -> f64;

    /// Sample rate used to convert times to frame positions
    fn sample_rate(&self) -> u32;
}

/// Clock driven by the mixer's rendered frame counter
///
/// The mixer advances the shared counter after every buffer, so `now()` is
/// the start of the next buffer to be rendered.
#[derive(Debug, Clone)]
pub struct SampleClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl SampleClock {
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self { frames, sample_rate }
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }
}

impl AudioClock for SampleClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Clock that only moves when told to (offline hosts, tests)
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    seconds_bits: Arc<AtomicU64>,
    sample_rate: u32,
}

impl ManualClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            seconds_bits: Arc::new(AtomicU64::new(0f64.to_bits())),
            sample_rate,
        }
    }

    pub fn set(&self, seconds: f64) {
        self.seconds_bits.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Acquire))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
