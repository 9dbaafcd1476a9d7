//! Audio buffer store
//!
//! Loads and caches decoded clips by character id:
//! - `ClipStore`: the process-wide cache (no eviction)
//! - `decode`: symphonia decoding + rubato resampling to the output rate
//! - `placeholder`: the deterministic fallback tone used when decoding fails

pub(crate) mod decode;
mod placeholder;
mod store;

pub use decode::decode_clip;
pub use placeholder::{placeholder_tone, PLACEHOLDER_DURATION};
pub use store::{ClipLoad, ClipSource, ClipStore};

use thiserror::Error;

use crate::types::StereoBuffer;

/// Where a clip's samples came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOrigin {
    Decoded,
    Placeholder,
}

/// Decoded, immutable audio for one character
#[derive(Debug, Clone)]
pub struct AudioClip {
    frames: StereoBuffer,
    sample_rate: u32,
    origin: ClipOrigin,
}

impl AudioClip {
    pub fn new(frames: StereoBuffer, sample_rate: u32, origin: ClipOrigin) -> Self {
        Self {
            frames,
            sample_rate,
            origin,
        }
    }

    #[inline]
    pub fn frames(&self) -> &StereoBuffer {
        &self.frames
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn origin(&self) -> ClipOrigin {
        self.origin
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin == ClipOrigin::Placeholder
    }

    /// Clip length in seconds
    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }
}

/// Errors raised while turning bytes into a clip
///
/// These never reach the caller of `ClipStore::load`; they are logged and
/// replaced by the placeholder tone.
#[derive(Debug, Error)]
pub enum ClipError {
    #[error("Failed to read clip source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Resample error: {0}")]
    Resample(String),

    #[error("Decoded clip contains no audio")]
    Empty,
}
