//! Signal Graph
//!
//! The fixed mastering topology:
//!
//! ```text
//! source → input gain → multiband → compressor → reverb → stereo width
//!        → limiter → A/B mix (original vs processed) → output gain → analysis
//! ```
//!
//! A graph is built once per loaded asset and never rewired. Enabling,
//! disabling and parameter edits are all scheduled on parameter timelines.

pub mod analysis;
pub mod automation;
pub mod bypass;
pub mod compressor;
pub mod gain;
pub mod limiter;
pub mod multiband;
pub mod param;
pub mod reverb;
pub mod stage;
pub mod width;

use tracing::debug;

use crate::config::EngineConfig;
use crate::engine::AudioBuffer;
use crate::settings::EngineSettings;

pub use analysis::{AnalysisSnapshot, AnalysisTap};
pub use automation::apply_delta;
pub use bypass::BypassMix;
pub use compressor::CompressorStage;
pub use gain::GainStage;
pub use limiter::LimiterStage;
pub use multiband::MultibandStage;
pub use param::{AudioParam, ParamEvent};
pub use reverb::ReverbStage;
pub use stage::{BlockClock, BuildContext, Stage};
pub use width::WidthStage;

/// One instance of the mastering chain
#[derive(Debug)]
pub struct SignalGraph {
    ctx: BuildContext,
    input_gain: GainStage,
    multiband: MultibandStage,
    compressor: CompressorStage,
    reverb: ReverbStage,
    width: WidthStage,
    limiter: LimiterStage,
    /// A/B mix: active selects the processed chain, bypass the original
    compare: BypassMix,
    output_gain: GainStage,
    analysis: Option<AnalysisTap>,
    /// Source block before input gain, for the A/B mix
    original: AudioBuffer,
}

impl SignalGraph {
    /// Build the chain with every parameter taken from `settings`
    ///
    /// # Arguments
    /// * `config` - Engine configuration (render quantum, smoothing, analysis)
    /// * `sample_rate` - Context sample rate the graph runs at
    /// * `num_channels` - Channel count of the asset
    /// * `settings` - Initial settings
    /// * `with_analysis` - Attach an analysis tap at the end of the chain
    pub fn build(
        config: &EngineConfig,
        sample_rate: u32,
        num_channels: usize,
        settings: &EngineSettings,
        with_analysis: bool,
    ) -> Self {
        let ctx = BuildContext::new(config, sample_rate, num_channels);
        debug!(sample_rate, num_channels, with_analysis, "building signal graph");

        Self {
            input_gain: GainStage::new("input.gain", &ctx, settings.input_gain),
            multiband: MultibandStage::build(&ctx, settings),
            compressor: CompressorStage::build(&ctx, settings),
            reverb: ReverbStage::build(&ctx, settings),
            width: WidthStage::build(&ctx, settings),
            limiter: LimiterStage::build(&ctx, settings),
            compare: BypassMix::new("compare.processed", &ctx, true),
            output_gain: GainStage::new("output.gain", &ctx, settings.output_gain),
            analysis: with_analysis
                .then(|| AnalysisTap::new(config, sample_rate, num_channels)),
            original: AudioBuffer::new(num_channels, ctx.render_quantum, sample_rate),
            ctx,
        }
    }

    /// Start the A/B mix on the original signal instead of the processed one
    pub fn with_original_selected(mut self, original: bool) -> Self {
        if original {
            self.compare = BypassMix::new("compare.processed", &self.ctx, false);
        }
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    /// The toggleable stages in signal order
    pub fn stages(&self) -> [&dyn Stage; 5] {
        [
            &self.multiband,
            &self.compressor,
            &self.reverb,
            &self.width,
            &self.limiter,
        ]
    }

    pub(crate) fn stages_mut(&mut self) -> [&mut dyn Stage; 5] {
        [
            &mut self.multiband,
            &mut self.compressor,
            &mut self.reverb,
            &mut self.width,
            &mut self.limiter,
        ]
    }

    pub fn input_gain_mut(&mut self) -> &mut GainStage {
        &mut self.input_gain
    }

    pub fn output_gain_mut(&mut self) -> &mut GainStage {
        &mut self.output_gain
    }

    pub fn multiband(&self) -> &MultibandStage {
        &self.multiband
    }

    pub fn multiband_mut(&mut self) -> &mut MultibandStage {
        &mut self.multiband
    }

    pub fn compressor(&self) -> &CompressorStage {
        &self.compressor
    }

    pub fn compressor_mut(&mut self) -> &mut CompressorStage {
        &mut self.compressor
    }

    pub fn reverb(&self) -> &ReverbStage {
        &self.reverb
    }

    pub fn reverb_mut(&mut self) -> &mut ReverbStage {
        &mut self.reverb
    }

    pub fn width(&self) -> &WidthStage {
        &self.width
    }

    pub fn width_mut(&mut self) -> &mut WidthStage {
        &mut self.width
    }

    pub fn limiter(&self) -> &LimiterStage {
        &self.limiter
    }

    pub fn limiter_mut(&mut self) -> &mut LimiterStage {
        &mut self.limiter
    }

    pub fn compare(&self) -> &BypassMix {
        &self.compare
    }

    pub fn analysis_mut(&mut self) -> Option<&mut AnalysisTap> {
        self.analysis.as_mut()
    }

    /// Crossfade the A/B mix to the original (`true`) or processed signal
    pub fn set_compare_original(&mut self, original: bool, at: f64) {
        self.compare.set_enabled(!original, at);
    }

    /// Schedule every stage towards `settings`, enable flags included
    pub fn apply_settings(&mut self, settings: &EngineSettings, at: f64) {
        self.input_gain.set_gain_db(settings.input_gain, at);
        self.output_gain.set_gain_db(settings.output_gain, at);

        let enabled = [
            settings.multiband.enabled,
            settings.compressor.enabled,
            settings.reverb.enabled,
            settings.stereo_width.enabled,
            settings.limiter.enabled,
        ];
        for (stage, enabled) in self.stages_mut().into_iter().zip(enabled) {
            stage.set_enabled(enabled, at);
            stage.update_params(settings, at);
        }
    }

    /// Run one block through the chain in place
    pub fn process(&mut self, buffer: &mut AudioBuffer, clock: &BlockClock) {
        self.original.samples.clone_from(&buffer.samples);
        self.original.sample_rate = buffer.sample_rate;

        self.input_gain.process(buffer, clock);
        for stage in self.stages_mut() {
            stage.process(buffer, clock);
        }
        self.compare.mix(buffer, &self.original, clock);
        self.output_gain.process(buffer, clock);

        if let Some(analysis) = self.analysis.as_mut() {
            analysis.process(buffer);
        }
    }

    /// Clear every stage's filter, envelope and delay memory
    pub fn reset(&mut self) {
        for stage in self.stages_mut() {
            stage.reset();
        }
    }
}
