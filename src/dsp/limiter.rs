//! Limiter kernel
//!
//! Brickwall limiter: near-instant attack, smooth release and a final clip so
//! no sample leaves above the ceiling.

use crate::dsp::compressor::time_to_coeff;
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::AudioBuffer;

// ============================================================================
// Constants
// ============================================================================

/// Minimum ceiling in dB
const MIN_CEILING_DB: f32 = -12.0;
/// Maximum ceiling in dB
const MAX_CEILING_DB: f32 = 0.0;

/// Very fast attack time for brickwall limiting
const ATTACK_SECS: f32 = 0.0001;
/// Gain recovery time
const RELEASE_SECS: f32 = 0.1;

/// Brickwall limiter
#[derive(Debug, Clone)]
pub struct Limiter {
    ceiling_db: f32,
    ceiling_linear: f32,
    /// Current gain reduction in dB (positive)
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Limiter {
    /// Create a limiter
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `ceiling_db` - Maximum output level (-12 to 0 dB)
    pub fn new(sample_rate: u32, ceiling_db: f32) -> Self {
        let ceiling_db = ceiling_db.clamp(MIN_CEILING_DB, MAX_CEILING_DB);
        Self {
            ceiling_db,
            ceiling_linear: db_to_linear(ceiling_db),
            envelope: 0.0,
            attack_coeff: time_to_coeff(ATTACK_SECS, sample_rate as f32),
            release_coeff: time_to_coeff(RELEASE_SECS, sample_rate as f32),
        }
    }

    pub fn ceiling_db(&self) -> f32 {
        self.ceiling_db
    }

    pub fn set_ceiling_db(&mut self, db: f32) {
        self.ceiling_db = db.clamp(MIN_CEILING_DB, MAX_CEILING_DB);
        self.ceiling_linear = db_to_linear(self.ceiling_db);
    }

    /// Current gain reduction in dB (0 or negative)
    pub fn gain_reduction_db(&self) -> f32 {
        -self.envelope
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        let num_channels = buffer.num_channels();
        for i in 0..buffer.num_samples() {
            let mut peak = 0.0_f32;
            for ch in 0..num_channels {
                peak = peak.max(buffer.samples[ch][i].abs());
            }

            let target = if peak > self.ceiling_linear {
                (linear_to_db(peak) - self.ceiling_db).max(0.0)
            } else {
                0.0
            };

            let coeff = if target > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * target;

            let gain = db_to_linear(-self.envelope);
            for ch in 0..num_channels {
                let sample = &mut buffer.samples[ch][i];
                *sample *= gain;
                if sample.abs() > self.ceiling_linear {
                    *sample = sample.signum() * self.ceiling_linear;
                }
            }
        }
    }
}
