//! Reverb stage
//!
//! A single damped feedback delay. Settings map onto the delay like this:
//!
//! * size: delay time, `size% × 100 ms` (at least 1 ms)
//! * damping: low-pass cutoff, 20 kHz at 0 % down to 500 Hz at 100 %
//! * decay: feedback `10^(-3 · delay / decay)`, so the loop falls 60 dB in
//!   `decay` seconds, capped at 0.95
//! * mix: wet gain `mix`, dry gain `1 - mix`

use crate::dsp::delay::{FeedbackDelay, MAX_DELAY_SECS, MAX_FEEDBACK, MIN_DELAY_SECS};
use crate::engine::AudioBuffer;
use crate::graph::bypass::BypassMix;
use crate::graph::param::AudioParam;
use crate::graph::stage::{BlockClock, BuildContext, Stage};
use crate::settings::{EngineSettings, ReverbSettings};

/// Cutoff with no damping (Hz)
const UNDAMPED_CUTOFF: f32 = 20000.0;
/// Cutoff at full damping (Hz)
const DAMPED_CUTOFF: f32 = 500.0;

/// Delay time for a room size in percent
pub fn delay_for_size(size_percent: f32) -> f32 {
    (size_percent / 100.0 * MAX_DELAY_SECS).clamp(MIN_DELAY_SECS, MAX_DELAY_SECS)
}

/// Feedback gain giving a 60 dB decay over `decay_secs`
pub fn feedback_for_decay(delay_secs: f32, decay_secs: f32) -> f32 {
    if decay_secs <= 0.0 {
        return 0.0;
    }
    10.0_f32.powf(-3.0 * delay_secs / decay_secs).min(MAX_FEEDBACK)
}

/// Damping low-pass cutoff for a damping amount in percent
pub fn cutoff_for_damping(damping_percent: f32) -> f32 {
    let damping = (damping_percent / 100.0).clamp(0.0, 1.0);
    DAMPED_CUTOFF + (1.0 - damping) * (UNDAMPED_CUTOFF - DAMPED_CUTOFF)
}

#[derive(Debug, Clone)]
pub struct ReverbStage {
    delay: FeedbackDelay,
    delay_time: AudioParam,
    feedback: AudioParam,
    cutoff: AudioParam,
    wet: AudioParam,
    dry: AudioParam,
    /// Last requested settings, needed because feedback depends on two fields
    size: f32,
    decay: f32,
    bypass: BypassMix,
    smoothing_secs: f64,
    wet_buffer: Vec<Vec<f32>>,
    wet_gains: Vec<f32>,
    dry_gains: Vec<f32>,
}

impl ReverbStage {
    pub fn set_mix(&mut self, mix_percent: f32, at: f64) {
        let mix = (mix_percent / 100.0).clamp(0.0, 1.0);
        self.wet.set_target_at_time(mix, at, self.smoothing_secs);
        self.dry
            .set_target_at_time(1.0 - mix, at, self.smoothing_secs);
    }

    pub fn set_size(&mut self, size_percent: f32, at: f64) {
        self.size = size_percent;
        self.delay_time
            .set_target_at_time(delay_for_size(size_percent), at, self.smoothing_secs);
        self.schedule_feedback(at);
    }

    pub fn set_decay(&mut self, decay_secs: f32, at: f64) {
        self.decay = decay_secs;
        self.schedule_feedback(at);
    }

    pub fn set_damping(&mut self, damping_percent: f32, at: f64) {
        self.cutoff
            .set_target_at_time(cutoff_for_damping(damping_percent), at, self.smoothing_secs);
    }

    pub fn bypass(&self) -> &BypassMix {
        &self.bypass
    }

    fn schedule_feedback(&mut self, at: f64) {
        let gain = feedback_for_decay(delay_for_size(self.size), self.decay);
        self.feedback
            .set_target_at_time(gain, at, self.smoothing_secs);
    }

    fn apply_settings(&mut self, s: &ReverbSettings, at: f64) {
        self.set_mix(s.mix, at);
        self.set_size(s.size, at);
        self.set_decay(s.decay, at);
        self.set_damping(s.damping, at);
    }
}

impl Stage for ReverbStage {
    fn build(ctx: &BuildContext, settings: &EngineSettings) -> Self {
        let s = &settings.reverb;
        let delay_secs = delay_for_size(s.size);
        let mix = (s.mix / 100.0).clamp(0.0, 1.0);
        Self {
            delay: FeedbackDelay::new(ctx.sample_rate, ctx.num_channels),
            delay_time: AudioParam::new("reverb.delay", delay_secs, MIN_DELAY_SECS, MAX_DELAY_SECS),
            feedback: AudioParam::new(
                "reverb.feedback",
                feedback_for_decay(delay_secs, s.decay),
                0.0,
                MAX_FEEDBACK,
            ),
            cutoff: AudioParam::new(
                "reverb.cutoff",
                cutoff_for_damping(s.damping),
                DAMPED_CUTOFF,
                UNDAMPED_CUTOFF,
            ),
            wet: AudioParam::new("reverb.wet", mix, 0.0, 1.0),
            dry: AudioParam::new("reverb.dry", 1.0 - mix, 0.0, 1.0),
            size: s.size,
            decay: s.decay,
            bypass: BypassMix::new("reverb.active", ctx, s.enabled),
            smoothing_secs: ctx.smoothing_secs,
            wet_buffer: vec![vec![0.0; ctx.render_quantum]; ctx.num_channels],
            wet_gains: vec![0.0; ctx.render_quantum],
            dry_gains: vec![0.0; ctx.render_quantum],
        }
    }

    fn name(&self) -> &'static str {
        "reverb"
    }

    fn set_enabled(&mut self, enabled: bool, at: f64) {
        self.bypass.set_enabled(enabled, at);
    }

    fn update_params(&mut self, settings: &EngineSettings, at: f64) {
        self.apply_settings(&settings.reverb, at);
    }

    fn process(&mut self, buffer: &mut AudioBuffer, clock: &BlockClock) {
        let t = clock.time();
        self.delay.set_delay_secs(self.delay_time.next_value(t));
        self.delay.set_feedback(self.feedback.next_value(t));
        self.delay.set_damping_cutoff(self.cutoff.next_value(t));

        let len = buffer.num_samples();
        self.wet_gains.resize(len, 0.0);
        self.dry_gains.resize(len, 0.0);
        self.wet.fill(t, clock.sample_rate, &mut self.wet_gains);
        self.dry.fill(t, clock.sample_rate, &mut self.dry_gains);
        self.wet_buffer
            .resize_with(buffer.num_channels(), Vec::new);
        for channel in &mut self.wet_buffer {
            channel.resize(len, 0.0);
        }

        self.bypass.capture(buffer);
        self.delay.process(&buffer.samples, &mut self.wet_buffer);
        for (out, wet) in buffer.samples.iter_mut().zip(&self.wet_buffer) {
            for (i, (s, &w)) in out.iter_mut().zip(wet).enumerate() {
                *s = *s * self.dry_gains[i] + w * self.wet_gains[i];
            }
        }
        self.bypass.apply(buffer, clock);
    }

    fn reset(&mut self) {
        self.delay.reset();
    }
}
