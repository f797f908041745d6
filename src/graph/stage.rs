//! Stage trait and the per-graph/per-block context stages run in

use crate::config::EngineConfig;
use crate::engine::AudioBuffer;
use crate::settings::EngineSettings;

/// Fixed facts a graph is built against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildContext {
    /// Context sample rate in Hz
    pub sample_rate: u32,
    /// Channel count of the loaded asset
    pub num_channels: usize,
    /// Frames per render quantum
    pub render_quantum: usize,
    /// Time constant for parameter edits, in seconds
    pub smoothing_secs: f64,
}

impl BuildContext {
    pub fn new(config: &EngineConfig, sample_rate: u32, num_channels: usize) -> Self {
        Self {
            sample_rate,
            num_channels,
            render_quantum: config.render_quantum,
            smoothing_secs: config.param_smoothing_secs,
        }
    }
}

/// Position of the block being rendered on the context timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockClock {
    /// Context frame of the block's first sample
    pub frame: u64,
    pub sample_rate: u32,
}

impl BlockClock {
    pub fn new(frame: u64, sample_rate: u32) -> Self {
        Self { frame, sample_rate }
    }

    /// Context time of the block's first sample in seconds
    #[inline]
    pub fn time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    /// Context time of sample `offset` within the block
    #[inline]
    pub fn time_at(&self, offset: usize) -> f64 {
        (self.frame + offset as u64) as f64 / self.sample_rate as f64
    }
}

/// A node of the fixed processing topology
///
/// Toggleable stages keep both a processing path and a pass-through path
/// alive; enabling or disabling schedules a crossfade between them instead of
/// rewiring anything.
pub trait Stage: Send {
    /// Construct the stage with every parameter set from `settings` at time 0
    fn build(ctx: &BuildContext, settings: &EngineSettings) -> Self
    where
        Self: Sized;

    /// Short label for logs
    fn name(&self) -> &'static str;

    /// Crossfade to the processing path (`true`) or the pass-through path
    fn set_enabled(&mut self, enabled: bool, at: f64);

    /// Schedule every parameter towards the values in `settings`
    fn update_params(&mut self, settings: &EngineSettings, at: f64);

    /// Process one block in place
    fn process(&mut self, buffer: &mut AudioBuffer, clock: &BlockClock);

    /// Clear filter, envelope and delay memory
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_clock_times() {
        let clock = BlockClock::new(48000, 48000);
        assert_eq!(clock.time(), 1.0);
        assert_eq!(clock.time_at(24000), 1.5);
    }

    #[test]
    fn test_build_context_from_config() {
        let config = EngineConfig::default();
        let ctx = BuildContext::new(&config, 44100, 2);
        assert_eq!(ctx.render_quantum, config.render_quantum);
        assert_eq!(ctx.smoothing_secs, config.param_smoothing_secs);
    }
}
