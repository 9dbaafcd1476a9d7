//! Fallback tone for clips that fail to load

use super::{AudioClip, ClipOrigin};
use crate::types::{StereoBuffer, StereoSample};

/// Length of the placeholder tone in seconds (one bar)
pub const PLACEHOLDER_DURATION: f64 = 2.0;

const BASE_FREQUENCY: f64 = 200.0;
const FREQUENCY_STEP_PER_CHAR: f64 = 50.0;
const AMPLITUDE: f32 = 0.5;

/// Synthesize the placeholder clip for `id`
///
/// A sine whose pitch depends only on the id length, gated into a click
/// pattern: every half second is audible for its first quarter and silent
/// for the second. Same id and sample rate always give the same samples.
pub fn placeholder_tone(id: &str, sample_rate: u32) -> AudioClip {
    let frequency = BASE_FREQUENCY + id.chars().count() as f64 * FREQUENCY_STEP_PER_CHAR;
    let frame_count = (sample_rate as f64 * PLACEHOLDER_DURATION) as usize;
    let gate_period = (sample_rate / 2) as usize;
    let gate_open = (sample_rate / 4) as usize;

    let mut frames = StereoBuffer::with_capacity(frame_count);
    for i in 0..frame_count {
        let value = if gate_period > 0 && i % gate_period > gate_open {
            0.0
        } else {
            let phase = i as f64 * 2.0 * std::f64::consts::PI * frequency / sample_rate as f64;
            phase.sin() as f32 * AMPLITUDE
        };
        frames.push(StereoSample::mono(value));
    }

    AudioClip::new(frames, sample_rate, ClipOrigin::Placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_two_seconds() {
        let clip = placeholder_tone("oren", 48000);
        assert_eq!(clip.len(), 96000);
        assert!((clip.duration() - 2.0).abs() < 1e-9);
        assert!(clip.is_placeholder());
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        let a = placeholder_tone("sky", 44100);
        let b = placeholder_tone("sky", 44100);
        assert_eq!(a.frames().as_slice(), b.frames().as_slice());
    }

    #[test]
    fn test_placeholder_gate_pattern() {
        let clip = placeholder_tone("gray", 48000);
        let frames = clip.frames();

        // Second quarter of each half second is silent
        let silent = &frames.as_slice()[12001..24000];
        assert!(silent.iter().all(|s| s.peak() == 0.0));

        // First quarter carries the tone
        let audible = &frames.as_slice()[0..12000];
        assert!(audible.iter().any(|s| s.peak() > 0.1));
    }

    #[test]
    fn test_placeholder_pitch_depends_on_id_length() {
        // Different lengths give different waveforms, same length gives the same
        let short = placeholder_tone("ab", 48000);
        let long = placeholder_tone("abcdef", 48000);
        let same_len = placeholder_tone("xy", 48000);
        assert_ne!(short.frames().as_slice(), long.frames().as_slice());
        assert_eq!(short.frames().as_slice(), same_len.frames().as_slice());
    }
}
