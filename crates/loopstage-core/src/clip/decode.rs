//! Audio decoding (symphonia) and sample-rate conversion (rubato)

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioClip, ClipError, ClipOrigin};
use crate::types::{Sample, StereoBuffer, StereoSample};

/// Resampler input chunk size in frames
const RESAMPLE_CHUNK: usize = 1024;

/// Decode an in-memory audio file into a stereo clip at `target_rate`
///
/// `extension` (e.g. "wav", "mp3") is only a format hint.
pub fn decode_clip(
    bytes: Vec<u8>,
    extension: Option<&str>,
    target_rate: u32,
) -> Result<AudioClip, ClipError> {
    let (interleaved, source_rate, channels) = decode_interleaved(bytes, extension)?;
    let frames = to_stereo(&interleaved, channels);
    if frames.is_empty() {
        return Err(ClipError::Empty);
    }

    let frames = if source_rate != target_rate {
        log::debug!(
            "decode_clip: resampling {} frames from {}Hz to {}Hz",
            frames.len(),
            source_rate,
            target_rate
        );
        resample(&frames, source_rate, target_rate)?
    } else {
        frames
    };

    Ok(AudioClip::new(frames, target_rate, ClipOrigin::Decoded))
}

fn decode_interleaved(
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<(Vec<Sample>, u32, usize), ClipError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| ClipError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ClipError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| ClipError::UnsupportedFormat("Unknown sample rate".to_string()))?;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ClipError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<Sample>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("decode_clip: error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("decode_clip: error decoding packet: {}", e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if channels == 0 {
        return Err(ClipError::Decode("No channels in decoded stream".to_string()));
    }

    Ok((samples, sample_rate, channels))
}

/// Mono is duplicated to both sides, extra channels beyond two are dropped
fn to_stereo(interleaved: &[Sample], channels: usize) -> StereoBuffer {
    let mut frames = StereoBuffer::with_capacity(interleaved.len() / channels.max(1));
    for frame in interleaved.chunks_exact(channels) {
        let sample = match frame {
            [mono] => StereoSample::mono(*mono),
            [left, right, ..] => StereoSample::new(*left, *right),
            [] => StereoSample::silence(),
        };
        frames.push(sample);
    }
    frames
}

fn resample(frames: &StereoBuffer, from: u32, to: u32) -> Result<StereoBuffer, ClipError> {
    use rubato::{FftFixedIn, Resampler};

    let mut resampler = FftFixedIn::<Sample>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, 2)
        .map_err(|e| ClipError::Resample(e.to_string()))?;

    let (left, right): (Vec<Sample>, Vec<Sample>) =
        frames.iter().map(|s| (s.left, s.right)).unzip();

    let expected = (left.len() as u64 * to as u64 / from as u64) as usize;
    let delay = resampler.output_delay();
    let mut out_left: Vec<Sample> = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
    let mut out_right: Vec<Sample> = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut pos = 0;
    while pos < left.len() {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(left.len());
        let chunk = [&left[pos..end], &right[pos..end]];
        let out = if end - pos == needed {
            resampler.process(&chunk[..], None)
        } else {
            resampler.process_partial(Some(&chunk[..]), None)
        }
        .map_err(|e| ClipError::Resample(e.to_string()))?;
        out_left.extend_from_slice(&out[0]);
        out_right.extend_from_slice(&out[1]);
        pos = end;
    }

    // Flush the filter delay
    while out_left.len() < expected + delay {
        let out = resampler
            .process_partial::<&[Sample]>(None, None)
            .map_err(|e| ClipError::Resample(e.to_string()))?;
        if out[0].is_empty() {
            break;
        }
        out_left.extend_from_slice(&out[0]);
        out_right.extend_from_slice(&out[1]);
    }

    let start = delay.min(out_left.len());
    let end = (delay + expected).min(out_left.len());
    Ok(StereoBuffer::from_channels(&out_left[start..end], &out_right[start..end]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a sine as a 16-bit WAV file in memory
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, seconds: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (sample_rate as f32 * seconds) as usize;
            for i in 0..frames {
                let t = i as f32 / sample_rate as f32;
                let value = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 16000.0) as i16;
                for _ in 0..channels {
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_stereo_wav() {
        let clip = decode_clip(wav_bytes(48000, 2, 0.5), Some("wav"), 48000).unwrap();
        assert_eq!(clip.len(), 24000);
        assert_eq!(clip.sample_rate(), 48000);
        assert!(!clip.is_placeholder());
        assert!(clip.frames().peak() > 0.4);
    }

    #[test]
    fn test_decode_mono_duplicates_channel() {
        let clip = decode_clip(wav_bytes(48000, 1, 0.1), Some("wav"), 48000).unwrap();
        assert!(clip.frames().iter().all(|s| s.left == s.right));
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let clip = decode_clip(wav_bytes(44100, 2, 1.0), Some("wav"), 48000).unwrap();
        assert_eq!(clip.sample_rate(), 48000);
        // Allow a chunk of slack at the tail
        let diff = (clip.len() as i64 - 48000).abs();
        assert!(diff <= RESAMPLE_CHUNK as i64, "got {} frames", clip.len());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_clip(vec![0x13; 512], None, 48000);
        assert!(result.is_err());
    }

    #[test]
    fn test_to_stereo_drops_extra_channels() {
        let frames = to_stereo(&[0.1, 0.2, 0.9, 0.3, 0.4, 0.9], 3);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], StereoSample::new(0.3, 0.4));
    }
}
