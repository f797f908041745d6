//! Sample rate conversion
//!
//! Band-limited FFT resampling through rubato. Used to move a decoded asset
//! into the live or offline context's rate and by the PCM transcoder.

use rubato::{FftFixedInOut, Resampler};
use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::{EngineError, Result};

/// Preferred input chunk; rubato rounds it to a multiple of the rate ratio
const CHUNK_FRAMES: usize = 1024;

/// Resample every channel of `buffer` to `target_rate`
///
/// Returns a clone when the rates already match. The output is aligned with
/// the input (the filter delay is trimmed) and holds
/// [`resampled_len`] frames.
///
/// # Errors
/// `InvalidConfig` when either rate is zero, `Render` when rubato rejects a
/// chunk.
pub fn resample_buffer(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if buffer.sample_rate == 0 || target_rate == 0 {
        return Err(EngineError::InvalidConfig {
            field: "sample_rate".to_string(),
            value: format!("{} -> {}", buffer.sample_rate, target_rate),
            expected: "non-zero source and target rates".to_string(),
        });
    }
    if buffer.sample_rate == target_rate || buffer.is_empty() || buffer.num_channels() == 0 {
        return Ok(AudioBuffer {
            samples: buffer.samples.clone(),
            sample_rate: target_rate,
        });
    }

    let source_rate = buffer.sample_rate;
    let channels = buffer.num_channels();
    let ratio = target_rate as f64 / source_rate as f64;
    let target_len = resampled_len(buffer.num_samples(), ratio);

    let mut resampler = FftFixedInOut::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        CHUNK_FRAMES,
        channels,
    )
    .map_err(|e| EngineError::InvalidConfig {
        field: "sample_rate".to_string(),
        value: format!("{} -> {}", source_rate, target_rate),
        expected: format!("a supported conversion ({})", e),
    })?;
    let delay = resampler.output_delay();
    debug!(source_rate, target_rate, delay, frames = target_len, "resampling");

    let wanted = delay + target_len;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted + CHUNK_FRAMES); channels];
    let mut chunk: Vec<Vec<f32>> = vec![Vec::with_capacity(CHUNK_FRAMES); channels];
    let mut pos = 0;

    // past the end of the input the chunks are zero-padded to flush the filter
    while output[0].len() < wanted {
        let frames = resampler.input_frames_next();
        for (dst, src) in chunk.iter_mut().zip(&buffer.samples) {
            dst.clear();
            if pos < src.len() {
                dst.extend_from_slice(&src[pos..(pos + frames).min(src.len())]);
            }
            dst.resize(frames, 0.0);
        }
        pos += frames;

        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| EngineError::Render {
                reason: format!("resampling {} -> {} Hz: {}", source_rate, target_rate, e),
            })?;
        for (dst, src) in output.iter_mut().zip(resampled) {
            dst.extend(src);
        }
    }

    for channel in &mut output {
        channel.drain(..delay);
        channel.truncate(target_len);
    }
    Ok(AudioBuffer {
        samples: output,
        sample_rate: target_rate,
    })
}

/// Number of frames `source_len` frames occupy after resampling by `ratio`
pub fn resampled_len(source_len: usize, ratio: f64) -> usize {
    ((source_len as f64) * ratio).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::asset::generate_test_tone;
    use crate::engine::buffer::rms_db;

    /// Skip the edges, where the tone starts and stops abruptly
    fn steady(samples: &[f32]) -> &[f32] {
        let edge = samples.len() / 8;
        &samples[edge..samples.len() - edge]
    }

    #[test]
    fn test_resample_buffer_preserves_duration() {
        let buffer = AudioBuffer::new(2, 44100, 44100);
        let up = resample_buffer(&buffer, 96000).unwrap();
        assert_eq!(up.sample_rate, 96000);
        assert_eq!(up.num_channels(), 2);
        assert_eq!(up.num_samples(), 96000);
    }

    #[test]
    fn test_same_rate_is_identity() {
        let mut buffer = AudioBuffer::new(1, 4, 48000);
        buffer.channel_mut(0).copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        let same = resample_buffer(&buffer, 48000).unwrap();
        assert_eq!(same, buffer);
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let buffer = AudioBuffer::new(1, 16, 48000);
        let err = resample_buffer(&buffer, 0).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_passband_tone_keeps_level_and_phase() {
        let tone = generate_test_tone(1000.0, 0.5, 0.5, 1, 48000);
        let down = resample_buffer(&tone, 44100).unwrap();
        assert_eq!(down.num_samples(), 22050);

        let expected = generate_test_tone(1000.0, 0.5, 0.5, 1, 44100);
        let (got, want) = (steady(&down.samples[0]), steady(&expected.samples[0]));
        assert!((rms_db(got) - rms_db(want)).abs() < 0.1);
        // delay trimmed: the waveform lines up sample for sample
        let max_error = got
            .iter()
            .zip(want)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_error < 0.05, "max error {}", max_error);
    }

    #[test]
    fn test_downsampling_rejects_content_above_new_nyquist() {
        // 20 kHz folds to 2050 Hz under naive decimation to 22.05 kHz
        let tone = generate_test_tone(20_000.0, 0.5, 0.5, 1, 48000);
        let down = resample_buffer(&tone, 22050).unwrap();
        assert_eq!(down.num_samples(), 11025);
        let level = rms_db(steady(&down.samples[0]));
        assert!(level < -40.0, "aliased energy at {} dB", level);
    }
}
