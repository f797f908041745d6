//! Gain node with a per-sample gain parameter

use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use crate::graph::param::AudioParam;
use crate::graph::stage::{BlockClock, BuildContext};

/// Linear gain applied per sample
#[derive(Debug, Clone)]
pub struct GainStage {
    gain: AudioParam,
    smoothing_secs: f64,
    gains: Vec<f32>,
}

impl GainStage {
    /// Gain stage starting at `gain_db`
    pub fn new(name: &'static str, ctx: &BuildContext, gain_db: f32) -> Self {
        Self::linear(name, ctx, db_to_linear(gain_db))
    }

    /// Gain stage starting at a linear gain
    pub fn linear(name: &'static str, ctx: &BuildContext, gain: f32) -> Self {
        Self {
            gain: AudioParam::new(name, gain, 0.0, f32::MAX),
            smoothing_secs: ctx.smoothing_secs,
            gains: vec![0.0; ctx.render_quantum],
        }
    }

    /// Schedule a smoothed move to `gain_db`
    pub fn set_gain_db(&mut self, gain_db: f32, at: f64) {
        self.gain
            .set_target_at_time(db_to_linear(gain_db), at, self.smoothing_secs);
    }

    /// Direct access to the gain timeline for envelopes
    pub fn param_mut(&mut self) -> &mut AudioParam {
        &mut self.gain
    }

    pub fn gain_at(&self, t: f64) -> f32 {
        self.gain.value_at(t)
    }

    pub fn process(&mut self, buffer: &mut AudioBuffer, clock: &BlockClock) {
        let len = buffer.num_samples();
        self.gains.resize(len, 0.0);
        self.gain.fill(clock.time(), clock.sample_rate, &mut self.gains);

        for channel in &mut buffer.samples {
            for (s, &g) in channel.iter_mut().zip(&self.gains) {
                *s *= g;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_static_gain() {
        let ctx = BuildContext::new(&EngineConfig::default(), 48000, 1);
        let mut stage = GainStage::new("input", &ctx, -6.0);
        let mut buffer = AudioBuffer::new(1, 128, 48000);
        buffer.samples[0].fill(1.0);
        stage.process(&mut buffer, &BlockClock::new(0, 48000));
        assert_abs_diff_eq!(buffer.samples[0][127], 0.501187, epsilon = 1e-5);
    }

    #[test]
    fn test_gain_change_is_smoothed() {
        let ctx = BuildContext::new(&EngineConfig::default(), 48000, 1);
        let mut stage = GainStage::new("output", &ctx, 0.0);
        stage.set_gain_db(-96.0, 0.0);
        // one time constant in
        assert!(stage.gain_at(0.01) > 0.3);
        assert!(stage.gain_at(0.2) < 0.001);
    }
}
