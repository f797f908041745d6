//! Broadband compressor stage

use crate::dsp::Compressor;
use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use crate::graph::bypass::BypassMix;
use crate::graph::gain::GainStage;
use crate::graph::param::AudioParam;
use crate::graph::stage::{BlockClock, BuildContext, Stage};
use crate::settings::{CompressorSettings, EngineSettings};

/// Compressor followed by makeup gain, behind a bypass mix
#[derive(Debug, Clone)]
pub struct CompressorStage {
    kernel: Compressor,
    threshold: AudioParam,
    ratio: AudioParam,
    attack: AudioParam,
    release: AudioParam,
    makeup: GainStage,
    bypass: BypassMix,
    smoothing_secs: f64,
}

impl CompressorStage {
    pub fn set_threshold(&mut self, threshold_db: f32, at: f64) {
        self.threshold
            .set_target_at_time(threshold_db, at, self.smoothing_secs);
    }

    pub fn set_ratio(&mut self, ratio: f32, at: f64) {
        self.ratio.set_target_at_time(ratio, at, self.smoothing_secs);
    }

    pub fn set_attack(&mut self, attack_secs: f32, at: f64) {
        self.attack
            .set_target_at_time(attack_secs, at, self.smoothing_secs);
    }

    pub fn set_release(&mut self, release_secs: f32, at: f64) {
        self.release
            .set_target_at_time(release_secs, at, self.smoothing_secs);
    }

    pub fn set_makeup_db(&mut self, gain_db: f32, at: f64) {
        self.makeup.set_gain_db(gain_db, at);
    }

    pub fn bypass(&self) -> &BypassMix {
        &self.bypass
    }

    /// Current gain reduction in dB, for metering
    pub fn gain_reduction_db(&self) -> f32 {
        self.kernel.gain_reduction_db()
    }

    fn apply_settings(&mut self, s: &CompressorSettings, at: f64) {
        self.set_threshold(s.threshold, at);
        self.set_ratio(s.ratio, at);
        self.set_attack(s.attack, at);
        self.set_release(s.release, at);
        self.set_makeup_db(s.gain, at);
    }
}

impl Stage for CompressorStage {
    fn build(ctx: &BuildContext, settings: &EngineSettings) -> Self {
        let s = &settings.compressor;
        let mut kernel = Compressor::new(ctx.sample_rate, s.threshold, s.ratio);
        kernel.set_attack(s.attack);
        kernel.set_release(s.release);
        Self {
            kernel,
            threshold: AudioParam::new("compressor.threshold", s.threshold, -60.0, 0.0),
            ratio: AudioParam::new("compressor.ratio", s.ratio, 1.0, 20.0),
            attack: AudioParam::new("compressor.attack", s.attack, 0.0, 1.0),
            release: AudioParam::new("compressor.release", s.release, 0.0, 1.0),
            makeup: GainStage::linear("compressor.makeup", ctx, db_to_linear(s.gain)),
            bypass: BypassMix::new("compressor.active", ctx, s.enabled),
            smoothing_secs: ctx.smoothing_secs,
        }
    }

    fn name(&self) -> &'static str {
        "compressor"
    }

    fn set_enabled(&mut self, enabled: bool, at: f64) {
        self.bypass.set_enabled(enabled, at);
    }

    fn update_params(&mut self, settings: &EngineSettings, at: f64) {
        self.apply_settings(&settings.compressor, at);
    }

    fn process(&mut self, buffer: &mut AudioBuffer, clock: &BlockClock) {
        let t = clock.time();
        self.kernel.set_threshold_db(self.threshold.next_value(t));
        self.kernel.set_ratio(self.ratio.next_value(t));
        self.kernel.set_attack(self.attack.next_value(t));
        self.kernel.set_release(self.release.next_value(t));

        self.bypass.capture(buffer);
        self.kernel.process(buffer);
        self.makeup.process(buffer, clock);
        self.bypass.apply(buffer, clock);
    }

    fn reset(&mut self) {
        self.kernel.reset();
    }
}
