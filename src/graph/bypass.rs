//! Dual-path crossfade mixer
//!
//! Every toggleable stage feeds both its processed output and an untouched
//! copy of its input into a [`BypassMix`]. A single scheduled `active`
//! coefficient drives both gains: the pass-through gain is always
//! `1 - active`, so the two sum to one at every sample, including mid-fade.

use crate::engine::AudioBuffer;
use crate::graph::param::AudioParam;
use crate::graph::stage::{BlockClock, BuildContext};

/// Two-input mixer with complementary gains
#[derive(Debug, Clone)]
pub struct BypassMix {
    active: AudioParam,
    enabled: bool,
    smoothing_secs: f64,
    /// Pass-through copy of the stage input
    dry: AudioBuffer,
    gains: Vec<f32>,
}

impl BypassMix {
    /// Create a mixer, fully on one path at time 0
    pub fn new(name: &'static str, ctx: &BuildContext, enabled: bool) -> Self {
        Self {
            active: AudioParam::new(name, if enabled { 1.0 } else { 0.0 }, 0.0, 1.0),
            enabled,
            smoothing_secs: ctx.smoothing_secs,
            dry: AudioBuffer::new(ctx.num_channels, ctx.render_quantum, ctx.sample_rate),
            gains: vec![0.0; ctx.render_quantum],
        }
    }

    /// Whether the latest request selected the processing path
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Schedule a crossfade towards the processing path or the pass-through
    pub fn set_enabled(&mut self, enabled: bool, at: f64) {
        self.enabled = enabled;
        let target = if enabled { 1.0 } else { 0.0 };
        self.active
            .set_target_at_time(target, at, self.smoothing_secs);
    }

    /// `(active, bypass)` gains at context time `t`
    pub fn coefficients_at(&self, t: f64) -> (f32, f32) {
        let active = self.active.value_at(t);
        (active, 1.0 - active)
    }

    /// Keep a copy of the stage input for the pass-through path
    pub fn capture(&mut self, input: &AudioBuffer) {
        self.dry.samples.clone_from(&input.samples);
        self.dry.sample_rate = input.sample_rate;
    }

    /// Mix `processed` with the captured input in place
    pub fn apply(&mut self, processed: &mut AudioBuffer, clock: &BlockClock) {
        mix_paths(&mut self.active, &mut self.gains, processed, &self.dry, clock);
    }

    /// Mix `processed` with an external pass-through signal in place
    pub fn mix(&mut self, processed: &mut AudioBuffer, bypass_path: &AudioBuffer, clock: &BlockClock) {
        mix_paths(&mut self.active, &mut self.gains, processed, bypass_path, clock);
    }
}

fn mix_paths(
    active: &mut AudioParam,
    gains: &mut Vec<f32>,
    processed: &mut AudioBuffer,
    bypass_path: &AudioBuffer,
    clock: &BlockClock,
) {
    let len = processed.num_samples();
    gains.resize(len, 0.0);
    active.fill(clock.time(), clock.sample_rate, gains);

    for (out, dry) in processed.samples.iter_mut().zip(&bypass_path.samples) {
        for ((o, &d), &a) in out.iter_mut().zip(dry).zip(gains.iter()) {
            *o = a * *o + (1.0 - a) * d;
        }
    }
}
