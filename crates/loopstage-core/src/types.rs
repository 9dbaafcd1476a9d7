//! Common types for loopstage
//!
//! Stage-wide constants and the stereo frame types shared by the clip
//! store, the loop mixer and the output backend.

use std::ops::{AddAssign, Index, Mul};

/// Output rate used until a device reports its own
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

pub const NUM_SLOTS: usize = 7;

/// One bar in seconds; clips are authored to exactly this length
pub const DEFAULT_LOOP_PERIOD: f64 = 2.0;

/// Lead time before bar 0 of a fresh session
pub const DEFAULT_SAFETY_MARGIN: f64 = 0.1;

pub type Sample = f32;

/// One stereo frame
///
/// Laid out as `[left, right]` so a frame slice casts to interleaved samples.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self::new(value, value)
    }

    /// Larger of the two channel magnitudes
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, gain: Sample) -> Self {
        Self::new(self.left * gain, self.right * gain)
    }
}

/// Growable run of stereo frames: a decoded clip or a render block
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    frames: Vec<StereoSample>,
}

impl StereoBuffer {
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            frames: Vec::with_capacity(frames),
        }
    }

    /// `len` frames of silence
    pub fn silence(len: usize) -> Self {
        Self {
            frames: vec![StereoSample::silence(); len],
        }
    }

    /// Pair up planar channels; the shorter one decides the length
    pub fn from_channels(left: &[Sample], right: &[Sample]) -> Self {
        left.iter()
            .zip(right)
            .map(|(&l, &r)| StereoSample::new(l, r))
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Resize a render block without reallocating
    ///
    /// New frames are silent. Stays allocation-free as long as `len` is
    /// within the capacity the buffer was created with.
    #[inline]
    pub fn set_len_from_capacity(&mut self, len: usize) {
        debug_assert!(len <= self.frames.capacity(), "render block outgrew its capacity");
        self.frames.resize(len, StereoSample::silence());
    }

    pub fn fill_silence(&mut self) {
        self.frames.fill(StereoSample::silence());
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.frames
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.frames
    }

    /// The frames as `[L, R, L, R, ...]`, without copying
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.frames)
    }

    #[inline]
    pub fn push(&mut self, frame: StereoSample) {
        self.frames.push(frame);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StereoSample> {
        self.frames.iter()
    }

    pub fn peak(&self) -> Sample {
        self.frames.iter().fold(0.0, |acc, f| acc.max(f.peak()))
    }
}

impl FromIterator<StereoSample> for StereoBuffer {
    fn from_iter<I: IntoIterator<Item = StereoSample>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, frame: usize) -> &StereoSample {
        &self.frames[frame]
    }
}
