//! Limiter stage

use crate::dsp::Limiter;
use crate::engine::AudioBuffer;
use crate::graph::bypass::BypassMix;
use crate::graph::param::AudioParam;
use crate::graph::stage::{BlockClock, BuildContext, Stage};
use crate::settings::EngineSettings;

/// Brickwall limiter behind a bypass mix
#[derive(Debug, Clone)]
pub struct LimiterStage {
    kernel: Limiter,
    threshold: AudioParam,
    bypass: BypassMix,
    smoothing_secs: f64,
}

impl LimiterStage {
    pub fn set_threshold(&mut self, threshold_db: f32, at: f64) {
        self.threshold
            .set_target_at_time(threshold_db, at, self.smoothing_secs);
    }

    pub fn bypass(&self) -> &BypassMix {
        &self.bypass
    }

    pub fn gain_reduction_db(&self) -> f32 {
        self.kernel.gain_reduction_db()
    }
}

impl Stage for LimiterStage {
    fn build(ctx: &BuildContext, settings: &EngineSettings) -> Self {
        let s = &settings.limiter;
        Self {
            kernel: Limiter::new(ctx.sample_rate, s.threshold),
            threshold: AudioParam::new("limiter.threshold", s.threshold, -12.0, 0.0),
            bypass: BypassMix::new("limiter.active", ctx, s.enabled),
            smoothing_secs: ctx.smoothing_secs,
        }
    }

    fn name(&self) -> &'static str {
        "limiter"
    }

    fn set_enabled(&mut self, enabled: bool, at: f64) {
        self.bypass.set_enabled(enabled, at);
    }

    fn update_params(&mut self, settings: &EngineSettings, at: f64) {
        self.set_threshold(settings.limiter.threshold, at);
    }

    fn process(&mut self, buffer: &mut AudioBuffer, clock: &BlockClock) {
        self.kernel
            .set_ceiling_db(self.threshold.next_value(clock.time()));
        self.bypass.capture(buffer);
        self.kernel.process(buffer);
        self.bypass.apply(buffer, clock);
    }

    fn reset(&mut self) {
        self.kernel.reset();
    }
}
