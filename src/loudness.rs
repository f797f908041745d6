//! Streaming loudness measurement
//!
//! Frames of per-channel samples go in; momentary, short-term and integrated
//! loudness, true peak and loudness range come out.
//!
//! The pre-filter is a single +4 dB high shelf at 1.5 kHz rather than the full
//! two-stage K-weighting curve, so readings track BS.1770 closely on music but
//! are not conformant.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::LoudnessConfig;
use crate::dsp::Biquad;
use crate::engine::AudioBuffer;

// ============================================================================
// Constants
// ============================================================================

/// Offset in the BS.1770 loudness formula
const LUFS_OFFSET: f64 = -0.691;

/// Lowest reported loudness (LUFS)
pub const LOUDNESS_FLOOR: f32 = -70.0;
/// Highest reported loudness (LUFS)
pub const LOUDNESS_CEILING: f32 = 10.0;
/// Lowest reported true peak (dBTP)
pub const TRUE_PEAK_FLOOR: f32 = -70.0;
/// Highest reported true peak (dBTP)
pub const TRUE_PEAK_CEILING: f32 = 20.0;
/// Largest reported loudness range (LU)
pub const LRA_CEILING: f32 = 50.0;

/// True-peak oversampling factor
const OVERSAMPLING: usize = 4;

/// Loudness from a mean-square power, unclamped
#[inline]
fn power_to_lufs(power: f64) -> f64 {
    LUFS_OFFSET + 10.0 * power.log10()
}

/// Mean-square power for a loudness
#[inline]
fn lufs_to_power(lufs: f64) -> f64 {
    10.0_f64.powf((lufs - LUFS_OFFSET) / 10.0)
}

fn clamp_reading(value: f64, floor: f32, ceiling: f32) -> f32 {
    if value.is_finite() {
        (value as f32).clamp(floor, ceiling)
    } else {
        floor
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Loudness readings at one moment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoudnessSnapshot {
    /// Momentary loudness (400 ms window), LUFS
    pub momentary: f32,
    /// Short-term loudness (3 s window), LUFS
    pub short_term: f32,
    /// Gated integrated loudness, LUFS
    pub integrated: f32,
    /// Maximum true peak, dBTP
    pub true_peak: f32,
    /// Loudness range, LU
    pub lra: f32,
}

impl LoudnessSnapshot {
    /// Readings for a session that has measured nothing
    pub fn silent() -> Self {
        Self {
            momentary: LOUDNESS_FLOOR,
            short_term: LOUDNESS_FLOOR,
            integrated: LOUDNESS_FLOOR,
            true_peak: TRUE_PEAK_FLOOR,
            lra: 0.0,
        }
    }
}

impl Default for LoudnessSnapshot {
    fn default() -> Self {
        Self::silent()
    }
}

// ============================================================================
// Power window
// ============================================================================

/// Duration-weighted sliding mean of frame powers
#[derive(Debug, Clone)]
struct PowerWindow {
    length_secs: f64,
    /// `(power, duration)` per frame, oldest first
    frames: VecDeque<(f64, f64)>,
    total_secs: f64,
}

impl PowerWindow {
    fn new(length_secs: f64) -> Self {
        Self {
            length_secs,
            frames: VecDeque::new(),
            total_secs: 0.0,
        }
    }

    fn push(&mut self, power: f64, duration: f64) {
        self.frames.push_back((power, duration));
        self.total_secs += duration;
        // keep the oldest frame only while it is still needed to fill the window
        while let Some(&(_, oldest)) = self.frames.front() {
            if self.total_secs - oldest >= self.length_secs {
                self.frames.pop_front();
                self.total_secs -= oldest;
            } else {
                break;
            }
        }
    }

    fn mean(&self) -> f64 {
        if self.total_secs <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = self.frames.iter().map(|(p, d)| p * d).sum();
        weighted / self.total_secs
    }
}

// ============================================================================
// Meter
// ============================================================================

/// Loudness accumulator for one measurement session
#[derive(Debug, Clone)]
pub struct LoudnessMeter {
    config: LoudnessConfig,
    sample_rate: u32,
    num_channels: usize,
    weighting: Biquad,
    filtered: Vec<f64>,
    momentary: PowerWindow,
    short_term: PowerWindow,
    /// Momentary-window power after every frame, for gating
    gated_powers: Vec<f64>,
    /// `(time, short-term LUFS)` above the absolute gate, for loudness range
    lra_history: VecDeque<(f64, f64)>,
    /// Previous frame's last sample per channel, for interpolation
    last_samples: Vec<f32>,
    true_peak: f32,
    elapsed_secs: f64,
}

impl LoudnessMeter {
    /// Create a meter
    ///
    /// # Arguments
    /// * `config` - Windows, gates and pre-filter
    /// * `sample_rate` - Sample rate of the measured signal
    /// * `num_channels` - Channel count of the measured signal
    pub fn new(config: &LoudnessConfig, sample_rate: u32, num_channels: usize) -> Self {
        Self {
            config: config.clone(),
            sample_rate,
            num_channels,
            weighting: Biquad::shelf(
                sample_rate,
                num_channels,
                config.shelf_frequency as f32,
                config.shelf_gain_db as f32,
            ),
            filtered: Vec::new(),
            momentary: PowerWindow::new(config.momentary_window_secs),
            short_term: PowerWindow::new(config.short_term_window_secs),
            gated_powers: Vec::new(),
            lra_history: VecDeque::new(),
            last_samples: vec![0.0; num_channels],
            true_peak: 0.0,
            elapsed_secs: 0.0,
        }
    }

    /// Measure a whole buffer in frames of `frame_size`
    pub fn measure(buffer: &AudioBuffer, config: &LoudnessConfig, frame_size: usize) -> LoudnessSnapshot {
        let mut meter = Self::new(config, buffer.sample_rate, buffer.num_channels());
        let frame_size = frame_size.max(1);
        let mut frame: Vec<&[f32]> = Vec::with_capacity(buffer.num_channels());
        let mut start = 0;
        while start < buffer.num_samples() {
            let end = (start + frame_size).min(buffer.num_samples());
            frame.clear();
            frame.extend(buffer.samples.iter().map(|ch| &ch[start..end]));
            meter.push_frame(frame.as_slice());
            start = end;
        }
        meter.snapshot()
    }

    /// Seconds of audio measured so far
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// Add one frame (one slice per channel, equal lengths)
    pub fn push_frame<S: AsRef<[f32]>>(&mut self, channels: &[S]) {
        let len = channels.first().map(|c| c.as_ref().len()).unwrap_or(0);
        if len == 0 {
            return;
        }

        self.track_true_peak(channels);

        let mut power = 0.0;
        self.filtered.resize(len, 0.0);
        for (ch, samples) in channels.iter().take(self.num_channels).enumerate() {
            self.weighting
                .process_channel_f64(ch, samples.as_ref(), &mut self.filtered);
            let sum: f64 = self.filtered.iter().map(|v| v * v).sum();
            power += sum / len as f64;
        }
        if !power.is_finite() {
            // non-finite filter state never decays on its own
            self.weighting.reset();
            power = 0.0;
        }

        let duration = len as f64 / self.sample_rate as f64;
        self.elapsed_secs += duration;
        self.momentary.push(power, duration);
        self.short_term.push(power, duration);
        self.gated_powers.push(self.momentary.mean());

        let short_term = power_to_lufs(self.short_term.mean());
        if short_term.is_finite() && short_term > self.config.absolute_gate_lufs {
            self.lra_history.push_back((self.elapsed_secs, short_term));
        }
        let horizon = self.elapsed_secs - self.config.lra_history_secs;
        while matches!(self.lra_history.front(), Some(&(t, _)) if t < horizon) {
            self.lra_history.pop_front();
        }
    }

    /// 4x linear interpolation between consecutive samples, continuing from
    /// the previous frame
    fn track_true_peak<S: AsRef<[f32]>>(&mut self, channels: &[S]) {
        for (ch, samples) in channels.iter().take(self.num_channels).enumerate() {
            let mut previous = self.last_samples[ch];
            for &sample in samples.as_ref() {
                for k in 1..=OVERSAMPLING {
                    let frac = k as f32 / OVERSAMPLING as f32;
                    let interpolated = previous + (sample - previous) * frac;
                    if interpolated.is_finite() {
                        self.true_peak = self.true_peak.max(interpolated.abs());
                    }
                }
                previous = sample;
            }
            self.last_samples[ch] = if previous.is_finite() { previous } else { 0.0 };
        }
    }

    fn integrated_lufs(&self) -> f64 {
        let absolute = lufs_to_power(self.config.absolute_gate_lufs);
        let above_absolute: Vec<f64> = self
            .gated_powers
            .iter()
            .copied()
            .filter(|&p| p > absolute)
            .collect();
        if above_absolute.is_empty() {
            return f64::NEG_INFINITY;
        }

        let ungated_mean = above_absolute.iter().sum::<f64>() / above_absolute.len() as f64;
        let relative = ungated_mean * 10.0_f64.powf(-self.config.relative_gate_lu / 10.0);
        let survivors: Vec<f64> = above_absolute.into_iter().filter(|&p| p > relative).collect();
        if survivors.is_empty() {
            return f64::NEG_INFINITY;
        }
        power_to_lufs(survivors.iter().sum::<f64>() / survivors.len() as f64)
    }

    fn loudness_range(&self) -> f64 {
        if self.lra_history.len() < 2 {
            return 0.0;
        }
        let mut values: Vec<f64> = self.lra_history.iter().map(|&(_, v)| v).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let len = values.len();
        let low = values[len / 10];
        let high = values[(len * 95 / 100).min(len - 1)];
        high - low
    }

    /// Current readings, clamped to display ranges
    pub fn snapshot(&self) -> LoudnessSnapshot {
        let true_peak_db = if self.true_peak > 0.0 {
            20.0 * (self.true_peak as f64).log10()
        } else {
            f64::NEG_INFINITY
        };
        LoudnessSnapshot {
            momentary: clamp_reading(
                power_to_lufs(self.momentary.mean()),
                LOUDNESS_FLOOR,
                LOUDNESS_CEILING,
            ),
            short_term: clamp_reading(
                power_to_lufs(self.short_term.mean()),
                LOUDNESS_FLOOR,
                LOUDNESS_CEILING,
            ),
            integrated: clamp_reading(self.integrated_lufs(), LOUDNESS_FLOOR, LOUDNESS_CEILING),
            true_peak: clamp_reading(true_peak_db, TRUE_PEAK_FLOOR, TRUE_PEAK_CEILING),
            lra: clamp_reading(self.loudness_range(), 0.0, LRA_CEILING),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::asset::generate_test_tone;
    use approx::assert_abs_diff_eq;

    fn measure(buffer: &AudioBuffer) -> LoudnessSnapshot {
        LoudnessMeter::measure(buffer, &LoudnessConfig::default(), 2048)
    }

    #[test]
    fn test_silence_reads_floors() {
        let snapshot = measure(&AudioBuffer::new(2, 48000, 48000));
        assert_eq!(snapshot, LoudnessSnapshot::silent());
    }

    #[test]
    fn test_power_window_is_duration_weighted() {
        let mut window = PowerWindow::new(0.4);
        window.push(1.0, 0.3);
        window.push(0.0, 0.1);
        assert_abs_diff_eq!(window.mean(), 0.75, epsilon = 1e-12);
        // the first frame is still needed to fill 0.4 s
        window.push(0.0, 0.2);
        assert_eq!(window.frames.len(), 3);
        window.push(0.0, 0.2);
        assert_eq!(window.mean(), 0.0);
    }

    #[test]
    fn test_steady_tone_readings_agree() {
        let tone = generate_test_tone(1000.0, 0.5, 5.0, 2, 48000);
        let snapshot = measure(&tone);
        assert_abs_diff_eq!(snapshot.momentary, snapshot.integrated, epsilon = 0.05);
        assert_abs_diff_eq!(snapshot.short_term, snapshot.integrated, epsilon = 0.05);
        assert!(snapshot.lra < 0.5);
        assert_abs_diff_eq!(snapshot.true_peak, -6.02, epsilon = 0.05);
    }

    #[test]
    fn test_relative_gate_ignores_quiet_passage() {
        let config = LoudnessConfig::default();
        let mut meter = LoudnessMeter::new(&config, 48000, 1);
        let loud = generate_test_tone(1000.0, 0.5, 5.0, 1, 48000);
        let quiet = generate_test_tone(1000.0, 0.005, 5.0, 1, 48000);
        for chunk in loud.samples[0].chunks(2048) {
            meter.push_frame(&[chunk]);
        }
        let loud_only = meter.snapshot().integrated;
        for chunk in quiet.samples[0].chunks(2048) {
            meter.push_frame(&[chunk]);
        }
        // the quiet half sits 40 dB down, far below the relative gate
        assert_abs_diff_eq!(meter.snapshot().integrated, loud_only, epsilon = 0.3);
        assert!(meter.snapshot().lra > 20.0);
    }

    #[test]
    fn test_non_finite_input_maps_to_floor() {
        let mut meter = LoudnessMeter::new(&LoudnessConfig::default(), 48000, 1);
        meter.push_frame(&[vec![f32::NAN; 2048]]);
        let snapshot = meter.snapshot();
        assert_eq!(snapshot.momentary, LOUDNESS_FLOOR);
        assert_eq!(snapshot.true_peak, TRUE_PEAK_FLOOR);
    }

    #[test]
    fn test_meter_recovers_after_non_finite_frame() {
        let config = LoudnessConfig::default();
        let tone = generate_test_tone(1000.0, 0.5, 1.0, 1, 48000);

        let mut clean = LoudnessMeter::new(&config, 48000, 1);
        let mut recovered = LoudnessMeter::new(&config, 48000, 1);
        recovered.push_frame(&[vec![f32::NAN; 2048]]);
        for chunk in tone.samples[0].chunks(2048) {
            clean.push_frame(&[chunk]);
            recovered.push_frame(&[chunk]);
        }

        let clean = clean.snapshot();
        let recovered = recovered.snapshot();
        assert!(recovered.momentary > LOUDNESS_FLOOR);
        assert!((recovered.momentary - clean.momentary).abs() < 0.1);
        assert!((recovered.true_peak - clean.true_peak).abs() < 0.01);
    }
}
