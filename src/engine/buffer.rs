//! Audio Buffer Management
//!
//! Non-interleaved `f32` audio used for decoded assets, render quanta and
//! offline renders alike.

use crate::error::{EngineError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Floor used when converting silence to decibels
pub const SILENCE_FLOOR_DB: f32 = -96.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
///
/// # Arguments
/// * `db` - Value in decibels
///
/// # Returns
/// Linear amplitude (0.0 to 1.0+ range)
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// # Arguments
/// * `linear` - Linear amplitude value
///
/// # Returns
/// Value in decibels, floored at [`SILENCE_FLOOR_DB`] for silence.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        SILENCE_FLOOR_DB
    } else {
        (20.0 * linear.log10()).max(SILENCE_FLOOR_DB)
    }
}

/// Calculate the RMS level of one channel slice in dB
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_FLOOR_DB;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    linear_to_db((sum_squares / samples.len() as f64).sqrt() as f32)
}

/// Calculate the peak level of one channel slice in dB
pub fn peak_db(samples: &[f32]) -> f32 {
    linear_to_db(samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max))
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Non-interleaved multichannel audio
///
/// Each channel is a separate `Vec<f32>`; all channels have equal length.
///
/// # Example
/// ```
/// use masterchain::engine::AudioBuffer;
///
/// // One second of stereo silence
/// let buffer = AudioBuffer::new(2, 48000, 48000);
/// assert_eq!(buffer.num_channels(), 2);
/// assert_eq!(buffer.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zeroed buffer
    ///
    /// # Arguments
    /// * `num_channels` - Channel count
    /// * `num_samples` - Number of samples per channel
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(num_channels: usize, num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Wrap per-channel sample vectors
    ///
    /// Fails if there are no channels or the channels differ in length.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Err(EngineError::decode("audio has no channels"));
        };
        let len = first.len();
        if let Some((ch, other)) = samples.iter().enumerate().find(|(_, c)| c.len() != len) {
            return Err(EngineError::decode(format!(
                "channel {} has {} samples, expected {}",
                ch,
                other.len(),
                len
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved sample data (L, R, L, R, ... for stereo)
    /// * `num_channels` - Channel count
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(interleaved: &[f32], num_channels: usize, sample_rate: u32) -> Result<Self> {
        if num_channels == 0 {
            return Err(EngineError::decode("audio has no channels"));
        }
        if interleaved.len() % num_channels != 0 {
            return Err(EngineError::decode(format!(
                "interleaved data length {} is not divisible by channel count {}",
                interleaved.len(),
                num_channels
            )));
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.num_channels();
        let num_samples = self.num_samples();
        let mut interleaved = Vec::with_capacity(num_channels * num_samples);
        for i in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[i]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_samples() as f64 / self.sample_rate as f64
    }

    /// Immutable access to a channel's samples
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Mutable access to a channel's samples
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Get a sample, or `None` when out of range
    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples.get(channel).and_then(|ch| ch.get(index)).copied()
    }

    /// Set every sample to zero
    pub fn fill_silence(&mut self) {
        for channel in &mut self.samples {
            channel.fill(0.0);
        }
    }

    /// Copy another buffer's contents (channel counts and lengths must match)
    pub fn copy_from(&mut self, other: &AudioBuffer) {
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            dst.copy_from_slice(src);
        }
    }

    /// Resize every channel, zero-filling new frames
    pub fn resize(&mut self, num_samples: usize) {
        for channel in &mut self.samples {
            channel.resize(num_samples, 0.0);
        }
    }

    /// Check that every sample is finite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().flatten().all(|s| s.is_finite())
    }

    /// Peak level across all channels in dB
    pub fn peak_db(&self) -> f32 {
        self.samples
            .iter()
            .map(|ch| peak_db(ch))
            .fold(SILENCE_FLOOR_DB, f32::max)
    }

    /// RMS level of one channel in dB
    pub fn rms_db(&self, channel: usize) -> f32 {
        rms_db(&self.samples[channel])
    }
}
