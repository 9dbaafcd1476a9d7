//! Audio-thread loop mixer
//!
//! Renders every scheduled voice whose start frame has been reached, each
//! looping at its own clip length. Runs inside the output callback, so it
//! never allocates after construction and never blocks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use super::clock::SampleClock;
use super::command::{LoopCommand, VoiceKey};
use crate::clip::AudioClip;
use crate::types::{StereoBuffer, StereoSample};

/// Upper bound on simultaneously scheduled voices
pub const MAX_VOICES: usize = 64;

struct Voice {
    key: VoiceKey,
    clip: Shared<AudioClip>,
    start_frame: u64,
}

impl Voice {
    /// Sample for absolute frame `frame`, silence before the start frame
    #[inline]
    fn sample_at(&self, frame: u64) -> StereoSample {
        if frame < self.start_frame {
            return StereoSample::silence();
        }
        let len = self.clip.len() as u64;
        if len == 0 {
            return StereoSample::silence();
        }
        let offset = ((frame - self.start_frame) % len) as usize;
        self.clip.frames()[offset]
    }
}

/// Sums looping voices into the output buffer
pub struct LoopMixer {
    voices: Vec<Voice>,
    commands: rtrb::Consumer<LoopCommand>,
    position: Arc<AtomicU64>,
    sample_rate: u32,
    gain: f32,
}

impl LoopMixer {
    pub fn new(commands: rtrb::Consumer<LoopCommand>, sample_rate: u32) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            commands,
            position: Arc::new(AtomicU64::new(0)),
            sample_rate,
            gain: 1.0,
        }
    }

    /// Clock that reads this mixer's rendered frame position
    pub fn clock(&self) -> SampleClock {
        SampleClock::new(self.position.clone(), self.sample_rate)
    }

    /// Absolute frame of the next sample to render
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    fn apply(&mut self, cmd: LoopCommand) {
        match cmd {
            LoopCommand::Start {
                key,
                clip,
                start_frame,
            } => {
                if self.voices.len() >= MAX_VOICES {
                    // Dropping `clip` here only decrements the refcount, the
                    // GC thread frees it
                    return;
                }
                self.voices.push(Voice {
                    key,
                    clip,
                    start_frame,
                });
            }
            LoopCommand::Stop { key } => {
                self.voices.retain(|v| v.key != key);
            }
            LoopCommand::StopAll => {
                self.voices.clear();
            }
            LoopCommand::SetVolume(volume) => {
                self.gain = volume.clamp(0.0, 1.0);
            }
        }
    }

    /// Drain pending commands and render `output.len()` frames
    pub fn process(&mut self, output: &mut StereoBuffer) {
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
        }

        output.fill_silence();
        let base = self.position();

        for voice in &self.voices {
            // Whole buffer still before this voice's start
            if voice.start_frame >= base + output.len() as u64 {
                continue;
            }
            for (i, out) in output.as_mut_slice().iter_mut().enumerate() {
                *out += voice.sample_at(base + i as u64);
            }
        }

        if self.gain != 1.0 {
            for out in output.as_mut_slice().iter_mut() {
                *out = *out * self.gain;
            }
        }

        self.position
            .fetch_add(output.len() as u64, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipOrigin;
    use crate::engine::{command_channel, gc_handle, AudioClock, SyncEngine};
    use crate::clip::{ClipSource, ClipStore};

    fn ramp_clip(len: usize) -> Shared<AudioClip> {
        let mut frames = StereoBuffer::with_capacity(len);
        for i in 0..len {
            frames.push(StereoSample::mono((i + 1) as f32 / 100.0));
        }
        Shared::new(&gc_handle(), AudioClip::new(frames, 48000, ClipOrigin::Decoded))
    }

    #[test]
    fn test_voice_waits_for_start_frame() {
        let (mut tx, rx) = command_channel();
        let mut mixer = LoopMixer::new(rx, 48000);
        let _ = tx.send(LoopCommand::Start {
            key: 0,
            clip: ramp_clip(4),
            start_frame: 6,
        });

        let mut out = StereoBuffer::silence(10);
        mixer.process(&mut out);

        for i in 0..6 {
            assert_eq!(out[i], StereoSample::silence());
        }
        assert_eq!(out[6].left, 0.01);
        assert_eq!(out[9].left, 0.04);
        assert_eq!(mixer.position(), 10);
    }

    #[test]
    fn test_voice_loops_at_clip_length() {
        let (mut tx, rx) = command_channel();
        let mut mixer = LoopMixer::new(rx, 48000);
        let _ = tx.send(LoopCommand::Start {
            key: 0,
            clip: ramp_clip(3),
            start_frame: 0,
        });

        let mut out = StereoBuffer::silence(7);
        mixer.process(&mut out);
        let lefts: Vec<f32> = out.iter().map(|s| s.left).collect();
        assert_eq!(lefts, vec![0.01, 0.02, 0.03, 0.01, 0.02, 0.03, 0.01]);
    }

    #[test]
    fn test_stop_before_start_never_sounds() {
        let (mut tx, rx) = command_channel();
        let mut mixer = LoopMixer::new(rx, 48000);
        let _ = tx.send(LoopCommand::Start {
            key: 5,
            clip: ramp_clip(8),
            start_frame: 100,
        });

        let mut out = StereoBuffer::silence(64);
        mixer.process(&mut out);
        let _ = tx.send(LoopCommand::Stop { key: 5 });

        for _ in 0..4 {
            mixer.process(&mut out);
            assert_eq!(out.peak(), 0.0);
        }
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_voices_sum_and_gain_applies() {
        let (mut tx, rx) = command_channel();
        let mut mixer = LoopMixer::new(rx, 48000);
        for key in 0..2 {
            let _ = tx.send(LoopCommand::Start {
                key,
                clip: ramp_clip(2),
                start_frame: 0,
            });
        }
        let _ = tx.send(LoopCommand::SetVolume(0.5));

        let mut out = StereoBuffer::silence(2);
        mixer.process(&mut out);
        assert!((out[0].left - 0.01).abs() < 1e-6);
        assert!((out[1].right - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_early_stop_through_engine_is_silent() {
        let (tx, rx) = command_channel();
        let mut mixer = LoopMixer::new(rx, 48000);
        let mut engine = SyncEngine::new(mixer.clock(), tx);

        let mut clips = ClipStore::new(".", 48000);
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(clips.load("x", ClipSource::Data(Vec::new())));

        let start = engine.start_loop("x", &clips).unwrap();
        assert!((start - 0.1).abs() < 1e-9);

        // Stop within the safety margin, before the first sample plays
        let mut out = StereoBuffer::silence(1024);
        mixer.process(&mut out);
        assert!(engine.clock().now() < start);
        engine.stop_loop("x");

        for _ in 0..20 {
            mixer.process(&mut out);
            assert_eq!(out.peak(), 0.0);
        }
        assert!(engine.clock().now() > start);
    }

    #[test]
    fn test_started_loop_sounds_from_scheduled_frame() {
        let (tx, rx) = command_channel();
        let mut mixer = LoopMixer::new(rx, 48000);
        let mut engine = SyncEngine::new(mixer.clock(), tx);

        let mut clips = ClipStore::new(".", 48000);
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(clips.load("x", ClipSource::Data(Vec::new())));
        engine.start_loop("x", &clips);

        // 4800 frames of silence (0.1 s), then the placeholder's first half-cycle
        let mut out = StereoBuffer::silence(4800);
        mixer.process(&mut out);
        assert_eq!(out.peak(), 0.0);

        let mut out = StereoBuffer::silence(480);
        mixer.process(&mut out);
        assert!(out.peak() > 0.1);
    }
}
