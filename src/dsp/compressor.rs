//! Dynamics compressor kernel
//!
//! Feed-forward compressor with linked peak detection, a fixed soft knee and
//! one-pole attack/release smoothing of the gain. Makeup gain is applied by the
//! owning stage so it can be automated per sample.

use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::AudioBuffer;

// ============================================================================
// Constants
// ============================================================================

/// Knee width in dB
pub const KNEE_DB: f32 = 6.0;

const MIN_THRESHOLD_DB: f32 = -60.0;
const MAX_THRESHOLD_DB: f32 = 0.0;
const MIN_RATIO: f32 = 1.0;
const MAX_RATIO: f32 = 20.0;
/// Longest attack/release accepted, in seconds
const MAX_TIME_SECS: f32 = 1.0;

/// One-pole coefficient for a time constant, 0 for an instant response
#[inline]
pub(crate) fn time_to_coeff(time_secs: f32, sample_rate: f32) -> f32 {
    let samples = time_secs * sample_rate;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Compressor dynamics processor
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    attack_secs: f32,
    release_secs: f32,
    sample_rate: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain (linear), shared across channels
    gain: f32,
}

impl Compressor {
    /// Create a compressor
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `threshold_db` - Threshold (-60 to 0 dB)
    /// * `ratio` - Compression ratio (1 to 20)
    pub fn new(sample_rate: u32, threshold_db: f32, ratio: f32) -> Self {
        let mut comp = Self {
            threshold_db: threshold_db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB),
            ratio: ratio.clamp(MIN_RATIO, MAX_RATIO),
            attack_secs: 0.003,
            release_secs: 0.25,
            sample_rate: sample_rate as f32,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            gain: 1.0,
        };
        comp.update_coefficients();
        comp
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.threshold_db = threshold_db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.clamp(MIN_RATIO, MAX_RATIO);
    }

    /// Set attack time in seconds
    pub fn set_attack(&mut self, attack_secs: f32) {
        let attack_secs = attack_secs.clamp(0.0, MAX_TIME_SECS);
        if attack_secs != self.attack_secs {
            self.attack_secs = attack_secs;
            self.update_coefficients();
        }
    }

    /// Set release time in seconds
    pub fn set_release(&mut self, release_secs: f32) {
        let release_secs = release_secs.clamp(0.0, MAX_TIME_SECS);
        if release_secs != self.release_secs {
            self.release_secs = release_secs;
            self.update_coefficients();
        }
    }

    /// Current gain reduction in dB (0 or negative), for metering
    pub fn gain_reduction_db(&self) -> f32 {
        linear_to_db(self.gain)
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_to_coeff(self.attack_secs, self.sample_rate);
        self.release_coeff = time_to_coeff(self.release_secs, self.sample_rate);
    }

    /// Static gain curve: gain change in dB for an input level in dB
    pub fn compute_gain_reduction_db(&self, input_db: f32) -> f32 {
        let threshold = self.threshold_db;
        let ratio = self.ratio;
        let knee_start = threshold - KNEE_DB / 2.0;
        let knee_end = threshold + KNEE_DB / 2.0;

        if input_db <= knee_start {
            0.0
        } else if input_db >= knee_end {
            (threshold + (input_db - threshold) / ratio) - input_db
        } else {
            // quadratic knee joining 1:1 and the full ratio
            let over = input_db - knee_start;
            (1.0 / ratio - 1.0) * over * over / (2.0 * KNEE_DB)
        }
    }

    /// Compress every channel in place with a linked gain
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        let num_channels = buffer.num_channels();
        for i in 0..buffer.num_samples() {
            let mut peak = 0.0_f32;
            for ch in 0..num_channels {
                peak = peak.max(buffer.samples[ch][i].abs());
            }

            let target = db_to_linear(self.compute_gain_reduction_db(linear_to_db(peak)));
            let coeff = if target < self.gain {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain = coeff * self.gain + (1.0 - coeff) * target;

            for ch in 0..num_channels {
                buffer.samples[ch][i] *= self.gain;
            }
        }
    }
}
