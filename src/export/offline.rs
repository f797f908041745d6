//! Offline rendering
//!
//! Runs the mastering chain over a whole asset without a playback context.
//! The graph is a fresh instance built for the output sample rate; it shares
//! nothing with the live graph.

use tracing::debug;

use crate::config::EngineConfig;
use crate::engine::{AudioAsset, AudioBuffer};
use crate::error::{EngineError, Result};
use crate::graph::{BlockClock, GainStage, SignalGraph};
use crate::settings::EngineSettings;

/// Renders an asset through the chain in one synchronous pass
#[derive(Debug, Clone)]
pub struct OfflineRenderer {
    config: EngineConfig,
}

impl OfflineRenderer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Render `asset` with `settings` at `sample_rate`
    ///
    /// The asset is resampled into the output rate before processing, so the
    /// whole chain runs at that rate. The export fades in `settings` are
    /// applied after the output gain.
    ///
    /// # Errors
    /// `Render` when the result is empty or contains non-finite samples, or
    /// when resampling into `sample_rate` fails.
    pub fn render(
        &self,
        asset: &AudioAsset,
        settings: &EngineSettings,
        sample_rate: u32,
    ) -> Result<AudioBuffer> {
        let settings = settings.sanitized();
        let input = asset.resampled(sample_rate)?;
        let channels = input.num_channels();
        let total = input.num_samples();
        if total == 0 {
            return Err(EngineError::Render {
                reason: "nothing to render".to_string(),
            });
        }

        let mut graph = SignalGraph::build(&self.config, sample_rate, channels, &settings, false);
        let (mut fade_in, mut fade_out) =
            fade_envelopes(&graph, &settings, total as f64 / sample_rate as f64);
        debug!(sample_rate, channels, frames = total, "offline render");

        let quantum = self.config.render_quantum;
        let mut output = AudioBuffer::new(channels, total, sample_rate);
        let mut block = AudioBuffer::new(channels, quantum, sample_rate);
        let mut offset = 0;
        while offset < total {
            let len = quantum.min(total - offset);
            block.resize(len);
            for (dst, src) in block.samples.iter_mut().zip(&input.samples) {
                dst.copy_from_slice(&src[offset..offset + len]);
            }

            let clock = BlockClock::new(offset as u64, sample_rate);
            graph.process(&mut block, &clock);
            fade_in.process(&mut block, &clock);
            fade_out.process(&mut block, &clock);

            for (dst, src) in output.samples.iter_mut().zip(&block.samples) {
                dst[offset..offset + len].copy_from_slice(src);
            }
            offset += len;
        }

        if !output.is_finite() {
            return Err(EngineError::Render {
                reason: "output contains NaN or infinite samples".to_string(),
            });
        }
        Ok(output)
    }
}

/// Linear fade-in and fade-out envelopes over `duration_secs`
///
/// Each fade lives on its own gain stage; where they overlap the gains
/// multiply.
fn fade_envelopes(
    graph: &SignalGraph,
    settings: &EngineSettings,
    duration_secs: f64,
) -> (GainStage, GainStage) {
    let ms_to_secs = |ms: Option<f32>| ms.map_or(0.0, |ms| (ms as f64 / 1000.0).min(duration_secs));
    let fade_in_secs = ms_to_secs(settings.fade_in_ms);
    let fade_out_secs = ms_to_secs(settings.fade_out_ms);

    let mut fade_in = GainStage::linear(
        "export.fade_in",
        graph.context(),
        if fade_in_secs > 0.0 { 0.0 } else { 1.0 },
    );
    if fade_in_secs > 0.0 {
        fade_in.param_mut().linear_ramp(1.0, 0.0, fade_in_secs);
    }

    let mut fade_out = GainStage::linear("export.fade_out", graph.context(), 1.0);
    if fade_out_secs > 0.0 {
        fade_out
            .param_mut()
            .linear_ramp(0.0, duration_secs - fade_out_secs, duration_secs);
    }
    (fade_in, fade_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc_asset(seconds: usize, rate: u32) -> AudioAsset {
        let frames = seconds * rate as usize;
        AudioAsset::from_channels(vec![vec![0.25; frames]; 2], rate).unwrap()
    }

    fn bypass_settings() -> EngineSettings {
        let mut settings = EngineSettings::default();
        settings.limiter.enabled = false;
        settings
    }

    #[test]
    fn test_render_matches_length() {
        let renderer = OfflineRenderer::new(EngineConfig::default());
        let output = renderer
            .render(&dc_asset(1, 44100), &bypass_settings(), 44100)
            .unwrap();
        assert_eq!(output.num_samples(), 44100);
        assert_eq!(output.num_channels(), 2);
        assert!((output.samples[0][1000] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_render_at_higher_rate() {
        let renderer = OfflineRenderer::new(EngineConfig::default());
        let output = renderer
            .render(&dc_asset(1, 44100), &bypass_settings(), 88200)
            .unwrap();
        assert_eq!(output.num_samples(), 88200);
        assert_eq!(output.sample_rate, 88200);
    }

    #[test]
    fn test_fades_shape_the_edges() {
        let renderer = OfflineRenderer::new(EngineConfig::default());
        let mut settings = bypass_settings();
        settings.fade_in_ms = Some(100.0);
        settings.fade_out_ms = Some(200.0);
        let output = renderer.render(&dc_asset(1, 48000), &settings, 48000).unwrap();
        let ch = &output.samples[0];

        assert!(ch[0].abs() < 1e-6);
        // halfway through the fade in
        assert!((ch[2400] - 0.125).abs() < 1e-3);
        assert!((ch[24000] - 0.25).abs() < 1e-6);
        // halfway through the fade out
        assert!((ch[43200] - 0.125).abs() < 1e-3);
        assert!(ch[47999].abs() < 1e-3);
    }

    #[test]
    fn test_overlapping_fades_multiply() {
        let renderer = OfflineRenderer::new(EngineConfig::default());
        let mut settings = bypass_settings();
        settings.fade_in_ms = Some(500.0);
        settings.fade_out_ms = Some(1000.0);
        let output = renderer.render(&dc_asset(1, 48000), &settings, 48000).unwrap();
        let ch = &output.samples[0];

        // a quarter of the way in: fade in at 0.5, fade out at 0.75
        assert!((ch[12000] - 0.25 * 0.5 * 0.75).abs() < 1e-3, "{}", ch[12000]);
        // fade in done, fade out halfway
        assert!((ch[24000] - 0.125).abs() < 1e-3, "{}", ch[24000]);
        assert!(ch[47999].abs() < 1e-3);
    }

    #[test]
    fn test_full_length_fade_out_is_audible() {
        let renderer = OfflineRenderer::new(EngineConfig::default());
        let mut settings = bypass_settings();
        settings.fade_out_ms = Some(1000.0);
        let output = renderer.render(&dc_asset(1, 48000), &settings, 48000).unwrap();
        let ch = &output.samples[0];

        assert!((ch[0] - 0.25).abs() < 1e-3, "{}", ch[0]);
        assert!((ch[24000] - 0.125).abs() < 1e-3, "{}", ch[24000]);
        assert!(output.peak_db() > -14.0);
    }
}
