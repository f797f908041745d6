//! Multiband compressor stage
//!
//! Each band isolates its range with a high-pass at its low edge followed by a
//! low-pass at its high edge, compresses it, applies makeup gain and an
//! activity gain, then joins the sum. An inactive band's activity gain is 0,
//! so its range is muted rather than passed dry.

use crate::dsp::{Biquad, Compressor, FilterType, BUTTERWORTH_Q};
use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use crate::graph::bypass::BypassMix;
use crate::graph::param::AudioParam;
use crate::graph::stage::{BlockClock, BuildContext, Stage};
use crate::settings::{Band, EngineSettings, MAX_FREQUENCY, MIN_FREQUENCY};

#[derive(Debug, Clone)]
struct BandChain {
    highpass: Biquad,
    lowpass: Biquad,
    compressor: Compressor,
    low_freq: AudioParam,
    high_freq: AudioParam,
    threshold: AudioParam,
    ratio: AudioParam,
    makeup: AudioParam,
    activity: AudioParam,
    scratch: AudioBuffer,
    makeup_gains: Vec<f32>,
    activity_gains: Vec<f32>,
}

impl BandChain {
    fn new(ctx: &BuildContext, band: &Band) -> Self {
        let channels = ctx.num_channels;
        Self {
            highpass: Biquad::new(
                FilterType::HighPass,
                ctx.sample_rate,
                channels,
                band.low_freq,
                BUTTERWORTH_Q,
            ),
            lowpass: Biquad::new(
                FilterType::LowPass,
                ctx.sample_rate,
                channels,
                band.high_freq,
                BUTTERWORTH_Q,
            ),
            compressor: Compressor::new(ctx.sample_rate, band.threshold, band.ratio),
            low_freq: AudioParam::new("band.low_freq", band.low_freq, MIN_FREQUENCY, MAX_FREQUENCY),
            high_freq: AudioParam::new("band.high_freq", band.high_freq, MIN_FREQUENCY, MAX_FREQUENCY),
            threshold: AudioParam::new("band.threshold", band.threshold, -60.0, 0.0),
            ratio: AudioParam::new("band.ratio", band.ratio, 1.0, 20.0),
            makeup: AudioParam::new("band.gain", db_to_linear(band.gain), 0.0, f32::MAX),
            activity: AudioParam::new("band.active", activity(band.active), 0.0, 1.0),
            scratch: AudioBuffer::new(channels, ctx.render_quantum, ctx.sample_rate),
            makeup_gains: vec![0.0; ctx.render_quantum],
            activity_gains: vec![0.0; ctx.render_quantum],
        }
    }

    /// Filter, compress and add this band's output into `sum`
    fn process_into(&mut self, input: &AudioBuffer, sum: &mut AudioBuffer, clock: &BlockClock) {
        let t = clock.time();
        self.highpass.set_frequency(self.low_freq.next_value(t));
        self.lowpass.set_frequency(self.high_freq.next_value(t));
        self.compressor.set_threshold_db(self.threshold.next_value(t));
        self.compressor.set_ratio(self.ratio.next_value(t));

        let len = input.num_samples();
        self.makeup_gains.resize(len, 0.0);
        self.activity_gains.resize(len, 0.0);
        self.makeup.fill(t, clock.sample_rate, &mut self.makeup_gains);
        self.activity
            .fill(t, clock.sample_rate, &mut self.activity_gains);

        self.scratch.samples.clone_from(&input.samples);
        for ch in 0..self.scratch.num_channels() {
            self.highpass.process_channel(ch, &mut self.scratch.samples[ch]);
            self.lowpass.process_channel(ch, &mut self.scratch.samples[ch]);
        }
        self.compressor.process(&mut self.scratch);

        for (out, band) in sum.samples.iter_mut().zip(&self.scratch.samples) {
            for (i, (o, &b)) in out.iter_mut().zip(band).enumerate() {
                *o += b * self.makeup_gains[i] * self.activity_gains[i];
            }
        }
    }

    fn reset(&mut self) {
        self.highpass.reset();
        self.lowpass.reset();
        self.compressor.reset();
    }
}

fn activity(active: bool) -> f32 {
    if active {
        1.0
    } else {
        0.0
    }
}

/// Five-band split compressor behind a bypass mix
#[derive(Debug, Clone)]
pub struct MultibandStage {
    bands: Vec<BandChain>,
    bypass: BypassMix,
    sum: AudioBuffer,
    smoothing_secs: f64,
}

impl MultibandStage {
    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn bypass(&self) -> &BypassMix {
        &self.bypass
    }

    /// `(low, high)` edges of band `index` at context time `t`
    pub fn band_edges_at(&self, index: usize, t: f64) -> Option<(f32, f32)> {
        self.bands
            .get(index)
            .map(|b| (b.low_freq.value_at(t), b.high_freq.value_at(t)))
    }

    pub fn set_band_low_freq(&mut self, index: usize, hz: f32, at: f64) {
        let tc = self.smoothing_secs;
        if let Some(band) = self.bands.get_mut(index) {
            band.low_freq.set_target_at_time(hz, at, tc);
        }
    }

    pub fn set_band_high_freq(&mut self, index: usize, hz: f32, at: f64) {
        let tc = self.smoothing_secs;
        if let Some(band) = self.bands.get_mut(index) {
            band.high_freq.set_target_at_time(hz, at, tc);
        }
    }

    /// Move the boundary between band `index` and band `index + 1`
    pub fn set_crossover(&mut self, index: usize, hz: f32, at: f64) {
        self.set_band_high_freq(index, hz, at);
        self.set_band_low_freq(index + 1, hz, at);
    }

    pub fn set_band_threshold(&mut self, index: usize, threshold_db: f32, at: f64) {
        let tc = self.smoothing_secs;
        if let Some(band) = self.bands.get_mut(index) {
            band.threshold.set_target_at_time(threshold_db, at, tc);
        }
    }

    pub fn set_band_ratio(&mut self, index: usize, ratio: f32, at: f64) {
        let tc = self.smoothing_secs;
        if let Some(band) = self.bands.get_mut(index) {
            band.ratio.set_target_at_time(ratio, at, tc);
        }
    }

    pub fn set_band_gain(&mut self, index: usize, gain_db: f32, at: f64) {
        let tc = self.smoothing_secs;
        if let Some(band) = self.bands.get_mut(index) {
            band.makeup.set_target_at_time(db_to_linear(gain_db), at, tc);
        }
    }

    pub fn set_band_active(&mut self, index: usize, active: bool, at: f64) {
        let tc = self.smoothing_secs;
        if let Some(band) = self.bands.get_mut(index) {
            band.activity.set_target_at_time(activity(active), at, tc);
        }
    }

    fn apply_band(&mut self, index: usize, band: &Band, at: f64) {
        self.set_band_low_freq(index, band.low_freq, at);
        self.set_band_high_freq(index, band.high_freq, at);
        self.set_band_threshold(index, band.threshold, at);
        self.set_band_ratio(index, band.ratio, at);
        self.set_band_gain(index, band.gain, at);
        self.set_band_active(index, band.active, at);
    }
}

impl Stage for MultibandStage {
    fn build(ctx: &BuildContext, settings: &EngineSettings) -> Self {
        let s = &settings.multiband;
        Self {
            bands: s.bands.iter().map(|b| BandChain::new(ctx, b)).collect(),
            bypass: BypassMix::new("multiband.active", ctx, s.enabled),
            sum: AudioBuffer::new(ctx.num_channels, ctx.render_quantum, ctx.sample_rate),
            smoothing_secs: ctx.smoothing_secs,
        }
    }

    fn name(&self) -> &'static str {
        "multiband"
    }

    fn set_enabled(&mut self, enabled: bool, at: f64) {
        self.bypass.set_enabled(enabled, at);
    }

    fn update_params(&mut self, settings: &EngineSettings, at: f64) {
        for (i, band) in settings.multiband.bands.iter().enumerate() {
            self.apply_band(i, band, at);
        }
    }

    fn process(&mut self, buffer: &mut AudioBuffer, clock: &BlockClock) {
        self.sum.samples.clone_from(&buffer.samples);
        self.sum.fill_silence();
        for band in &mut self.bands {
            band.process_into(buffer, &mut self.sum, clock);
        }

        self.bypass.capture(buffer);
        buffer.copy_from(&self.sum);
        self.bypass.apply(buffer, clock);
    }

    fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }
}
