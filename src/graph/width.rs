//! Stereo width stage

use crate::dsp::{apply_width, width_coefficients};
use crate::engine::AudioBuffer;
use crate::graph::bypass::BypassMix;
use crate::graph::param::AudioParam;
use crate::graph::stage::{BlockClock, BuildContext, Stage};
use crate::settings::EngineSettings;

/// Mid/side style width matrix on the first two channels
///
/// When disabled the matrix itself is also pinned to the identity, so the
/// processed path equals the input once the coefficients settle.
#[derive(Debug, Clone)]
pub struct WidthStage {
    direct: AudioParam,
    crossfeed: AudioParam,
    width_percent: f32,
    bypass: BypassMix,
    smoothing_secs: f64,
    direct_gains: Vec<f32>,
    crossfeed_gains: Vec<f32>,
}

impl WidthStage {
    /// Schedule a new width in percent (ignored while disabled)
    pub fn set_width(&mut self, width_percent: f32, at: f64) {
        self.width_percent = width_percent;
        if self.bypass.is_enabled() {
            self.schedule_matrix(width_percent, at);
        }
    }

    pub fn bypass(&self) -> &BypassMix {
        &self.bypass
    }

    /// `(direct, crossfeed)` at context time `t`
    pub fn coefficients_at(&self, t: f64) -> (f32, f32) {
        (self.direct.value_at(t), self.crossfeed.value_at(t))
    }

    fn schedule_matrix(&mut self, width_percent: f32, at: f64) {
        let (direct, crossfeed) = width_coefficients(width_percent);
        self.direct
            .set_target_at_time(direct, at, self.smoothing_secs);
        self.crossfeed
            .set_target_at_time(crossfeed, at, self.smoothing_secs);
    }
}

impl Stage for WidthStage {
    fn build(ctx: &BuildContext, settings: &EngineSettings) -> Self {
        let s = &settings.stereo_width;
        let (direct, crossfeed) = if s.enabled {
            width_coefficients(s.width)
        } else {
            (1.0, 0.0)
        };
        Self {
            direct: AudioParam::new("width.direct", direct, 0.0, 1.5),
            crossfeed: AudioParam::new("width.crossfeed", crossfeed, -0.5, 0.5),
            width_percent: s.width,
            bypass: BypassMix::new("width.active", ctx, s.enabled),
            smoothing_secs: ctx.smoothing_secs,
            direct_gains: vec![0.0; ctx.render_quantum],
            crossfeed_gains: vec![0.0; ctx.render_quantum],
        }
    }

    fn name(&self) -> &'static str {
        "stereo_width"
    }

    fn set_enabled(&mut self, enabled: bool, at: f64) {
        self.bypass.set_enabled(enabled, at);
        let width = if enabled { self.width_percent } else { 100.0 };
        self.schedule_matrix(width, at);
    }

    fn update_params(&mut self, settings: &EngineSettings, at: f64) {
        self.set_width(settings.stereo_width.width, at);
    }

    fn process(&mut self, buffer: &mut AudioBuffer, clock: &BlockClock) {
        let len = buffer.num_samples();
        self.direct_gains.resize(len, 0.0);
        self.crossfeed_gains.resize(len, 0.0);
        self.direct
            .fill(clock.time(), clock.sample_rate, &mut self.direct_gains);
        self.crossfeed
            .fill(clock.time(), clock.sample_rate, &mut self.crossfeed_gains);

        if buffer.num_channels() < 2 {
            return;
        }

        self.bypass.capture(buffer);
        let (left, rest) = buffer.samples.split_at_mut(1);
        apply_width(
            &mut left[0],
            &mut rest[0],
            &self.direct_gains,
            &self.crossfeed_gains,
        );
        self.bypass.apply(buffer, clock);
    }

    fn reset(&mut self) {}
}
