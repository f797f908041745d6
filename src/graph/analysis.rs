//! Analysis tap at the end of the graph
//!
//! Collects the output into fixed-size frames. Every completed frame becomes
//! the "latest" frame shown by snapshots and, during a measurement session,
//! is fed to the loudness meter.

use std::fmt;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Serialize;

use crate::config::{EngineConfig, LoudnessConfig};
use crate::engine::buffer::{linear_to_db, rms_db};
use crate::engine::AudioBuffer;
use crate::loudness::{LoudnessMeter, LoudnessSnapshot};

/// Display data for one moment of playback
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    /// Mono mix of the latest analysis frame
    pub waveform: Vec<f32>,
    /// Smoothed magnitude per FFT bin in dB (`frame_size / 2` bins)
    pub spectrum: Vec<f32>,
    /// RMS level per channel in dB
    pub levels_db: Vec<f32>,
    pub loudness: LoudnessSnapshot,
}

pub struct AnalysisTap {
    frame_size: usize,
    sample_rate: u32,
    pending: Vec<Vec<f32>>,
    latest: Vec<Vec<f32>>,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    smoothing: f32,
    /// Smoothed linear magnitudes
    magnitudes: Vec<f32>,
    loudness_config: LoudnessConfig,
    meter: Option<LoudnessMeter>,
    metering: bool,
}

impl fmt::Debug for AnalysisTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisTap")
            .field("frame_size", &self.frame_size)
            .field("sample_rate", &self.sample_rate)
            .field("metering", &self.metering)
            .finish_non_exhaustive()
    }
}

impl AnalysisTap {
    pub fn new(config: &EngineConfig, sample_rate: u32, num_channels: usize) -> Self {
        let frame_size = config.analysis_frame_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);

        // Hann window
        let window = (0..frame_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / frame_size as f32).cos())
            })
            .collect();

        Self {
            frame_size,
            sample_rate,
            pending: vec![Vec::with_capacity(frame_size); num_channels],
            latest: vec![vec![0.0; frame_size]; num_channels],
            fft,
            window,
            fft_buffer: vec![Complex::new(0.0, 0.0); frame_size],
            smoothing: config.spectrum_smoothing,
            magnitudes: vec![0.0; frame_size / 2],
            loudness_config: config.loudness.clone(),
            meter: None,
            metering: false,
        }
    }

    /// Start a fresh measurement session
    pub fn begin_session(&mut self) {
        self.meter = Some(LoudnessMeter::new(
            &self.loudness_config,
            self.sample_rate,
            self.latest.len(),
        ));
        self.metering = true;
        for channel in &mut self.pending {
            channel.clear();
        }
    }

    /// Stop feeding the meter but keep its readings
    pub fn suspend_session(&mut self) {
        self.metering = false;
    }

    /// Drop the measurement session
    pub fn end_session(&mut self) {
        self.meter = None;
        self.metering = false;
    }

    pub fn has_session(&self) -> bool {
        self.meter.is_some()
    }

    /// Observe one rendered block
    pub fn process(&mut self, buffer: &AudioBuffer) {
        let mut offset = 0;
        let len = buffer.num_samples();
        while offset < len {
            let filled = self.pending.first().map(Vec::len).unwrap_or(0);
            let take = (self.frame_size - filled).min(len - offset);
            for (pending, channel) in self.pending.iter_mut().zip(&buffer.samples) {
                pending.extend_from_slice(&channel[offset..offset + take]);
            }
            offset += take;

            if filled + take == self.frame_size {
                std::mem::swap(&mut self.pending, &mut self.latest);
                for channel in &mut self.pending {
                    channel.clear();
                }
                if self.metering {
                    if let Some(meter) = self.meter.as_mut() {
                        meter.push_frame(self.latest.as_slice());
                    }
                }
            }
        }
    }

    /// Build a snapshot from the latest frame
    ///
    /// Spectrum smoothing is applied per call.
    pub fn snapshot(&mut self) -> AnalysisSnapshot {
        let num_channels = self.latest.len().max(1) as f32;
        let waveform: Vec<f32> = (0..self.frame_size)
            .map(|i| self.latest.iter().map(|ch| ch[i]).sum::<f32>() / num_channels)
            .collect();

        for (i, slot) in self.fft_buffer.iter_mut().enumerate() {
            *slot = Complex::new(waveform[i] * self.window[i], 0.0);
        }
        self.fft.process(&mut self.fft_buffer);

        let scale = 1.0 / self.frame_size as f32;
        for (smoothed, bin) in self.magnitudes.iter_mut().zip(&self.fft_buffer) {
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * bin.norm() * scale;
        }
        let spectrum = self.magnitudes.iter().map(|&m| linear_to_db(m)).collect();

        AnalysisSnapshot {
            waveform,
            spectrum,
            levels_db: self.latest.iter().map(|ch| rms_db(ch)).collect(),
            loudness: self
                .meter
                .as_ref()
                .map(LoudnessMeter::snapshot)
                .unwrap_or_default(),
        }
    }
}
