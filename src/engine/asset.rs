//! Decoded audio assets
//!
//! An [`AudioAsset`] is the immutable PCM the engine plays and exports. It is
//! replaced wholesale on every load and never mutated in place.

use crate::engine::buffer::AudioBuffer;
use crate::engine::resample::resample_buffer;
use crate::error::{EngineError, Result};

/// Decoded PCM owned by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    buffer: AudioBuffer,
}

impl AudioAsset {
    /// Wrap decoded audio, rejecting empty or malformed buffers
    pub fn new(buffer: AudioBuffer) -> Result<Self> {
        if buffer.num_channels() == 0 {
            return Err(EngineError::decode("audio has no channels"));
        }
        if buffer.sample_rate == 0 {
            return Err(EngineError::decode("sample rate is zero"));
        }
        if buffer.is_empty() {
            return Err(EngineError::decode("audio contains no samples"));
        }
        if !buffer.is_finite() {
            return Err(EngineError::decode("audio contains NaN or infinite samples"));
        }
        Ok(Self { buffer })
    }

    /// Build an asset from per-channel sample vectors
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        Self::new(AudioBuffer::from_channels(samples, sample_rate)?)
    }

    pub fn num_channels(&self) -> usize {
        self.buffer.num_channels()
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate
    }

    pub fn num_frames(&self) -> usize {
        self.buffer.num_samples()
    }

    pub fn duration_secs(&self) -> f64 {
        self.buffer.duration_secs()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        self.buffer.channel(index)
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    /// Copy of the samples at another sample rate
    pub fn resampled(&self, sample_rate: u32) -> Result<AudioBuffer> {
        resample_buffer(&self.buffer, sample_rate)
    }
}

/// Generate a sine tone on every channel
///
/// # Arguments
/// * `frequency` - Frequency of the sine wave in Hz
/// * `amplitude` - Peak amplitude (1.0 = full scale)
/// * `duration_secs` - Duration of the tone in seconds
/// * `channels` - Channel count
/// * `sample_rate` - Sample rate in Hz
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_secs: f32,
    channels: usize,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    let tone: Vec<f32> = (0..num_samples)
        .map(|i| amplitude * (angular_freq * i as f64).sin() as f32)
        .collect();

    AudioBuffer {
        samples: vec![tone; channels],
        sample_rate,
    }
}
