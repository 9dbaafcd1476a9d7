//! cpal output stream driving the loop mixer
//!
//! ```text
//! ┌──────────────────┐   LoopCommand    ┌─────────────────────┐
//! │   SyncEngine     │───push()────────►│   Command Queue     │
//! │  (control flow)  │                  │  (lock-free SPSC)   │
//! └──────────────────┘                  └──────────┬──────────┘
//!         ▲                                        │ pop()
//!         │ frame counter (atomic)                 ▼
//! ┌──────────────────┐                  ┌─────────────────────┐
//! │   SampleClock    │◄─────────────────│  cpal audio thread  │
//! │                  │   fetch_add()    │  (owns LoopMixer)   │
//! └──────────────────┘                  └─────────────────────┘
//! ```

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::{AudioConfig, MAX_BUFFER_SIZE};
use super::device::{default_output_device, find_device_by_id};
use super::error::{AudioError, AudioResult};
use crate::engine::{LoopCommand, LoopMixer, SampleClock};
use crate::types::{StereoBuffer, StereoSample, DEFAULT_SAMPLE_RATE};

/// Keeps the output stream alive; drop it to stop audio
pub struct OutputHandle {
    _stream: Stream,
    clock: SampleClock,
    sample_rate: u32,
    buffer_size: u32,
}

impl OutputHandle {
    /// Clock following the frames rendered by this stream
    pub fn clock(&self) -> SampleClock {
        self.clock.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffer size in frames as requested from the device
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the configured output device and start rendering `commands`
///
/// The mixer is created at the negotiated sample rate and moved into the
/// audio callback; the returned handle exposes its clock.
pub fn start_output(
    config: &AudioConfig,
    commands: rtrb::Consumer<LoopCommand>,
) -> AudioResult<OutputHandle> {
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => default_output_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported_config = get_output_config(&device, config)?;
    let sample_rate = supported_config.sample_rate().0;
    let buffer_size = config.buffer_size.frames();

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        config.buffer_size.latency_ms(sample_rate)
    );

    let mixer = LoopMixer::new(commands, sample_rate);
    let clock = mixer.clock();
    let state = AudioCallbackState::new(mixer);

    let stream = build_output_stream(&device, &stream_config, state)?;
    stream.play()?;

    log::info!("Audio stream started");

    Ok(OutputHandle {
        _stream: stream,
        clock,
        sample_rate,
        buffer_size,
    })
}

/// Everything the callback owns
struct AudioCallbackState {
    mixer: LoopMixer,
    /// Pre-allocated render buffer
    buffer: StereoBuffer,
}

impl AudioCallbackState {
    fn new(mixer: LoopMixer) -> Self {
        Self {
            mixer,
            buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    /// Render into an interleaved device buffer of `channels` channels
    fn render(&mut self, data: &mut [f32], channels: usize) {
        // Devices may hand us more than MAX_BUFFER_SIZE frames at once
        for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            let n_frames = chunk.len() / channels;
            self.buffer.set_len_from_capacity(n_frames);
            self.mixer.process(&mut self.buffer);
            write_frames(chunk, channels, &self.buffer);
        }
    }
}

/// Copy stereo frames into an interleaved buffer, silencing extra channels
fn write_frames(data: &mut [f32], channels: usize, buffer: &StereoBuffer) {
    if channels == 2 && data.len() == buffer.len() * 2 {
        data.copy_from_slice(buffer.as_interleaved());
        return;
    }

    let samples: &[StereoSample] = buffer.as_slice();
    for (i, frame) in data.chunks_mut(channels).enumerate() {
        match samples.get(i) {
            Some(sample) => {
                frame[0] = sample.left;
                if channels > 1 {
                    frame[1] = sample.right;
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
            None => frame.fill(0.0),
        }
    }
}

/// Pick an f32 stereo config at the requested rate, or the closest fallback
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target_sample_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);

    // The callback writes f32, so only f32 configs are usable
    let f32_configs: Vec<_> = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let best_config = f32_configs
        .iter()
        .find(|c| c.channels() >= 2 && supports_rate(c, target_sample_rate))
        .or_else(|| f32_configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| f32_configs.first())
        .ok_or_else(|| {
            AudioError::ConfigError("No f32 output configuration found".to_string())
        })?;

    let sample_rate = if supports_rate(best_config, target_sample_rate) {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (clips will be resampled)",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    Ok((*best_config).clone().with_sample_rate(sample_rate))
}

fn supports_rate(range: &cpal::SupportedStreamConfigRange, rate: u32) -> bool {
    rate >= range.min_sample_rate().0 && rate <= range.max_sample_rate().0
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: AudioCallbackState,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            state.render(data, channels);
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )?;
    Ok(stream)
}
