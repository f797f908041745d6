//! Engine configuration
//!
//! Static tuning for a session: render quantum, analysis frame size,
//! parameter smoothing and the loudness meter's windows. Every field has a
//! default, so a partial JSON document is a valid configuration.

use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Sample rates the engine renders at, for playback and export alike
pub const SAMPLE_RATE_RANGE: RangeInclusive<u32> = 8000..=384_000;

/// Reject a sample rate outside [`SAMPLE_RATE_RANGE`]
pub fn check_sample_rate(field: &str, sample_rate: u32) -> Result<u32> {
    if SAMPLE_RATE_RANGE.contains(&sample_rate) {
        Ok(sample_rate)
    } else {
        Err(invalid(field, sample_rate, "8000 to 384000 Hz"))
    }
}

/// Loudness meter tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessConfig {
    /// Corner frequency of the K-weighting shelf approximation (Hz)
    pub shelf_frequency: f64,
    /// Gain of the K-weighting shelf approximation (dB)
    pub shelf_gain_db: f64,
    /// Momentary window length in seconds
    pub momentary_window_secs: f64,
    /// Short-term window length in seconds
    pub short_term_window_secs: f64,
    /// Length of the rolling history used for loudness range
    pub lra_history_secs: f64,
    /// Absolute gate in LUFS
    pub absolute_gate_lufs: f64,
    /// Relative gate in LU below the ungated mean
    pub relative_gate_lu: f64,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            shelf_frequency: 1500.0,
            shelf_gain_db: 4.0,
            momentary_window_secs: 0.4,
            short_term_window_secs: 3.0,
            lra_history_secs: 20.0,
            absolute_gate_lufs: -70.0,
            relative_gate_lu: 10.0,
        }
    }
}

/// Session-wide engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate of the live playback context in Hz
    pub sample_rate: u32,
    /// Frames processed per graph pass
    pub render_quantum: usize,
    /// Frames per analysis frame (also the FFT size, must be a power of two)
    pub analysis_frame_size: usize,
    /// Time constant for scheduled parameter changes in seconds
    pub param_smoothing_secs: f64,
    /// Fade-in applied when a playback source starts, in seconds
    pub declick_secs: f64,
    /// Spectrum smoothing between snapshots (0 = none, <1)
    pub spectrum_smoothing: f32,
    pub loudness: LoudnessConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            render_quantum: 128,
            analysis_frame_size: 2048,
            param_smoothing_secs: 0.01,
            declick_secs: 0.005,
            spectrum_smoothing: 0.8,
            loudness: LoudnessConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validate ranges
    pub fn validate(&self) -> Result<()> {
        check_sample_rate("sample_rate", self.sample_rate)?;
        if self.render_quantum == 0 || self.render_quantum > 8192 {
            return Err(invalid("render_quantum", self.render_quantum, "1 to 8192 frames"));
        }
        if !self.analysis_frame_size.is_power_of_two()
            || !(32..=32768).contains(&self.analysis_frame_size)
        {
            return Err(invalid(
                "analysis_frame_size",
                self.analysis_frame_size,
                "a power of two from 32 to 32768",
            ));
        }
        if !(self.param_smoothing_secs > 0.0 && self.param_smoothing_secs <= 1.0) {
            return Err(invalid(
                "param_smoothing_secs",
                self.param_smoothing_secs,
                "greater than 0, at most 1 s",
            ));
        }
        if !(0.0..=1.0).contains(&self.declick_secs) {
            return Err(invalid("declick_secs", self.declick_secs, "0 to 1 s"));
        }
        if !(0.0..1.0).contains(&self.spectrum_smoothing) {
            return Err(invalid(
                "spectrum_smoothing",
                self.spectrum_smoothing,
                "0 (inclusive) to 1 (exclusive)",
            ));
        }
        let loudness = &self.loudness;
        if !(loudness.momentary_window_secs > 0.0
            && loudness.short_term_window_secs >= loudness.momentary_window_secs)
        {
            return Err(invalid(
                "loudness.short_term_window_secs",
                loudness.short_term_window_secs,
                "at least the momentary window",
            ));
        }
        if loudness.lra_history_secs <= 0.0 {
            return Err(invalid(
                "loudness.lra_history_secs",
                loudness.lra_history_secs,
                "a positive duration",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, expected: &str) -> EngineError {
    EngineError::InvalidConfig {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}
