//! Processing settings
//!
//! [`EngineSettings`] is an immutable snapshot handed over by the caller. The
//! engine applies it wholesale when a graph is built and as a delta against
//! the previously applied copy afterwards. Field names serialize in
//! camelCase so settings documents match what front ends send.

use serde::{Deserialize, Serialize};

/// Lowest frequency covered by the multiband stage (Hz)
pub const MIN_FREQUENCY: f32 = 20.0;
/// Highest frequency covered by the multiband stage (Hz)
pub const MAX_FREQUENCY: f32 = 20000.0;
/// Number of multiband bands
pub const NUM_BANDS: usize = 5;

/// Broadband compressor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressorSettings {
    pub enabled: bool,
    /// Threshold in dB (-60 to 0)
    pub threshold: f32,
    /// Ratio (1 to 20)
    pub ratio: f32,
    /// Attack in seconds (0 to 1)
    pub attack: f32,
    /// Release in seconds (0 to 1)
    pub release: f32,
    /// Makeup gain in dB (0 to 24)
    pub gain: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: -24.0,
            ratio: 4.0,
            attack: 0.003,
            release: 0.25,
            gain: 0.0,
        }
    }
}

/// Limiter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimiterSettings {
    pub enabled: bool,
    /// Ceiling in dB (-12 to 0)
    pub threshold: f32,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: -1.0,
        }
    }
}

/// Stereo width settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StereoWidthSettings {
    pub enabled: bool,
    /// Width in percent (0 = mono, 100 = unchanged, 200 = widest)
    pub width: f32,
}

impl Default for StereoWidthSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            width: 100.0,
        }
    }
}

/// Reverb settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbSettings {
    pub enabled: bool,
    /// Wet share in percent
    pub mix: f32,
    /// Room size in percent of the 100 ms maximum delay
    pub size: f32,
    /// Time for the feedback tail to fall by 60 dB, in seconds (0.1 to 10)
    pub decay: f32,
    /// High-frequency damping in percent
    pub damping: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mix: 20.0,
            size: 50.0,
            decay: 2.0,
            damping: 50.0,
        }
    }
}

/// One multiband compressor band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Band {
    pub name: String,
    /// Low edge in Hz
    pub low_freq: f32,
    /// High edge in Hz
    pub high_freq: f32,
    /// Threshold in dB
    pub threshold: f32,
    pub ratio: f32,
    /// Makeup gain in dB
    pub gain: f32,
    /// Inactive bands are muted
    pub active: bool,
}

impl Band {
    fn new(name: &str, low_freq: f32, high_freq: f32) -> Self {
        Self {
            name: name.to_string(),
            low_freq,
            high_freq,
            threshold: -20.0,
            ratio: 2.0,
            gain: 0.0,
            active: true,
        }
    }
}

/// Multiband compressor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MultibandSettings {
    pub enabled: bool,
    pub bands: Vec<Band>,
}

impl Default for MultibandSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bands: vec![
                Band::new("Sub", MIN_FREQUENCY, 120.0),
                Band::new("Low", 120.0, 500.0),
                Band::new("Mid", 500.0, 2000.0),
                Band::new("High-Mid", 2000.0, 8000.0),
                Band::new("Air", 8000.0, MAX_FREQUENCY),
            ],
        }
    }
}

impl MultibandSettings {
    /// Move the crossover between band `index` and band `index + 1`
    ///
    /// The frequency is clamped strictly between the neighbouring edges so
    /// neither band collapses. Returns `false` when `index` names no crossover.
    pub fn set_crossover(&mut self, index: usize, frequency: f32) -> bool {
        if index + 1 >= self.bands.len() {
            return false;
        }
        let lower = self.bands[index].low_freq;
        let upper = self.bands[index + 1].high_freq;
        let frequency = clamp_between(frequency, lower, upper);
        self.bands[index].high_freq = frequency;
        self.bands[index + 1].low_freq = frequency;
        true
    }

    /// Edit one edge of one band, keeping the neighbour contiguous
    ///
    /// The outer edges (20 Hz and 20 kHz) are fixed; editing them is a no-op.
    pub fn set_band_edge(&mut self, index: usize, edge: BandEdge, frequency: f32) -> bool {
        match edge {
            BandEdge::Low if index > 0 => self.set_crossover(index - 1, frequency),
            BandEdge::High => self.set_crossover(index, frequency),
            BandEdge::Low => false,
        }
    }

    /// Crossover frequencies between adjacent bands
    pub fn crossovers(&self) -> Vec<f32> {
        self.bands.windows(2).map(|w| w[0].high_freq).collect()
    }

    /// Check band ordering and coverage
    pub fn is_contiguous(&self) -> bool {
        let (Some(first), Some(last)) = (self.bands.first(), self.bands.last()) else {
            return false;
        };
        first.low_freq == MIN_FREQUENCY
            && last.high_freq == MAX_FREQUENCY
            && self.bands.iter().all(|b| b.low_freq < b.high_freq)
            && self.bands.windows(2).all(|w| w[0].high_freq == w[1].low_freq)
    }

    /// Restore exactly [`NUM_BANDS`] ordered, contiguous bands spanning the
    /// full range. Each band's high edge wins over its neighbour's low edge.
    pub fn normalize(&mut self) {
        let defaults = MultibandSettings::default().bands;
        if self.bands.len() != NUM_BANDS {
            self.bands.truncate(NUM_BANDS);
            let start = self.bands.len();
            self.bands.extend_from_slice(&defaults[start..]);
        }

        let mut low = MIN_FREQUENCY;
        for i in 0..NUM_BANDS {
            let remaining = (NUM_BANDS - 1 - i) as f32;
            let band = &mut self.bands[i];
            band.low_freq = low;
            if i == NUM_BANDS - 1 {
                band.high_freq = MAX_FREQUENCY;
            } else {
                // leave at least 1 Hz for every band still to come
                let ceiling = MAX_FREQUENCY - remaining;
                let high = if band.high_freq.is_finite() {
                    band.high_freq
                } else {
                    defaults[i].high_freq
                };
                band.high_freq = high.clamp(low + 1.0, ceiling);
            }
            low = band.high_freq;

            band.threshold = band.threshold.clamp(-60.0, 0.0);
            band.ratio = band.ratio.clamp(1.0, 20.0);
            band.gain = band.gain.clamp(-24.0, 24.0);
        }
    }
}

/// Which edge of a band is being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandEdge {
    Low,
    High,
}

/// Complete settings snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    /// Input gain in dB
    pub input_gain: f32,
    /// Output gain in dB
    pub output_gain: f32,
    pub compressor: CompressorSettings,
    pub limiter: LimiterSettings,
    pub stereo_width: StereoWidthSettings,
    pub reverb: ReverbSettings,
    pub multiband: MultibandSettings,
    /// Export-only fade in (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_in_ms: Option<f32>,
    /// Export-only fade out (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_out_ms: Option<f32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            input_gain: 0.0,
            output_gain: 0.0,
            compressor: CompressorSettings::default(),
            limiter: LimiterSettings::default(),
            stereo_width: StereoWidthSettings::default(),
            reverb: ReverbSettings::default(),
            multiband: MultibandSettings::default(),
            fade_in_ms: None,
            fade_out_ms: None,
        }
    }
}

impl EngineSettings {
    /// Parse a settings document
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let settings: EngineSettings = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Copy with every field clamped into its valid range and the bands
    /// normalized. NaN values fall back to the field's default.
    pub fn sanitized(&self) -> Self {
        let defaults = EngineSettings::default();
        let mut s = self.clone();

        s.input_gain = clamp_or(s.input_gain, -48.0, 24.0, defaults.input_gain);
        s.output_gain = clamp_or(s.output_gain, -48.0, 24.0, defaults.output_gain);

        let c = &mut s.compressor;
        let dc = &defaults.compressor;
        c.threshold = clamp_or(c.threshold, -60.0, 0.0, dc.threshold);
        c.ratio = clamp_or(c.ratio, 1.0, 20.0, dc.ratio);
        c.attack = clamp_or(c.attack, 0.0, 1.0, dc.attack);
        c.release = clamp_or(c.release, 0.0, 1.0, dc.release);
        c.gain = clamp_or(c.gain, 0.0, 24.0, dc.gain);

        s.limiter.threshold = clamp_or(s.limiter.threshold, -12.0, 0.0, defaults.limiter.threshold);
        s.stereo_width.width = clamp_or(s.stereo_width.width, 0.0, 200.0, 100.0);

        let r = &mut s.reverb;
        let dr = &defaults.reverb;
        r.mix = clamp_or(r.mix, 0.0, 100.0, dr.mix);
        r.size = clamp_or(r.size, 0.0, 100.0, dr.size);
        r.decay = clamp_or(r.decay, 0.1, 10.0, dr.decay);
        r.damping = clamp_or(r.damping, 0.0, 100.0, dr.damping);

        s.multiband.normalize();

        s.fade_in_ms = s.fade_in_ms.filter(|v| v.is_finite()).map(|v| v.max(0.0));
        s.fade_out_ms = s.fade_out_ms.filter(|v| v.is_finite()).map(|v| v.max(0.0));
        s
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

fn clamp_between(value: f32, lower: f32, upper: f32) -> f32 {
    if value.is_nan() {
        return (lower + upper) / 2.0;
    }
    let min = lower + 1.0;
    let max = upper - 1.0;
    if min > max {
        (lower + upper) / 2.0
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_default_bands_are_contiguous() {
        let multiband = MultibandSettings::default();
        assert_eq!(multiband.bands.len(), NUM_BANDS);
        assert!(multiband.is_contiguous());
        assert_eq!(multiband.crossovers(), vec![120.0, 500.0, 2000.0, 8000.0]);
    }

    #[test_case(0, 250.0 ; "first crossover")]
    #[test_case(1, 800.0 ; "second crossover")]
    #[test_case(3, 12000.0 ; "last crossover")]
    fn test_set_crossover_updates_both_bands(index: usize, frequency: f32) {
        let mut multiband = MultibandSettings::default();
        assert!(multiband.set_crossover(index, frequency));
        assert_eq!(multiband.bands[index].high_freq, frequency);
        assert_eq!(multiband.bands[index + 1].low_freq, frequency);
        assert!(multiband.is_contiguous());
    }

    #[test]
    fn test_set_crossover_clamps_to_neighbours() {
        let mut multiband = MultibandSettings::default();
        // between Low (120..500) and Mid (500..2000): must stay inside 120..2000
        multiband.set_crossover(1, 50_000.0);
        assert_eq!(multiband.bands[1].high_freq, 1999.0);
        multiband.set_crossover(1, 0.0);
        assert_eq!(multiband.bands[1].high_freq, 121.0);
        assert!(multiband.is_contiguous());
    }

    #[test]
    fn test_set_crossover_out_of_range_index() {
        let mut multiband = MultibandSettings::default();
        assert!(!multiband.set_crossover(4, 1000.0));
        assert_eq!(multiband, MultibandSettings::default());
    }

    #[test]
    fn test_band_edge_edits_keep_outer_edges_fixed() {
        let mut multiband = MultibandSettings::default();
        assert!(!multiband.set_band_edge(0, BandEdge::Low, 40.0));
        assert!(!multiband.set_band_edge(4, BandEdge::High, 18000.0));
        assert!(multiband.set_band_edge(2, BandEdge::Low, 600.0));
        assert_eq!(multiband.bands[1].high_freq, 600.0);
        assert!(multiband.is_contiguous());
    }

    #[test]
    fn test_normalize_repairs_gaps_and_overlaps() {
        let mut multiband = MultibandSettings::default();
        multiband.bands[0].low_freq = 35.0;
        multiband.bands[1].low_freq = 150.0; // gap after Sub
        multiband.bands[2].high_freq = 100.0; // below its low edge
        multiband.bands[4].high_freq = 22050.0;
        multiband.normalize();
        assert!(multiband.is_contiguous());
    }

    #[test]
    fn test_normalize_pads_missing_bands() {
        let mut multiband = MultibandSettings::default();
        multiband.bands.truncate(2);
        multiband.normalize();
        assert_eq!(multiband.bands.len(), NUM_BANDS);
        assert!(multiband.is_contiguous());
    }

    #[test]
    fn test_sanitized_clamps_fields() {
        let mut settings = EngineSettings::default();
        settings.compressor.ratio = 100.0;
        settings.stereo_width.width = 500.0;
        settings.reverb.decay = f32::NAN;
        settings.fade_in_ms = Some(-5.0);

        let clean = settings.sanitized();
        assert_eq!(clean.compressor.ratio, 20.0);
        assert_eq!(clean.stereo_width.width, 200.0);
        assert_eq!(clean.reverb.decay, ReverbSettings::default().decay);
        assert_eq!(clean.fade_in_ms, Some(0.0));
    }

    #[test]
    fn test_camel_case_json() {
        let settings = EngineSettings::from_json_str(
            r#"{
                "inputGain": -3.0,
                "stereoWidth": { "enabled": true, "width": 150 },
                "fadeOutMs": 500
            }"#,
        )
        .unwrap();
        assert_eq!(settings.input_gain, -3.0);
        assert!(settings.stereo_width.enabled);
        assert_eq!(settings.stereo_width.width, 150.0);
        assert_eq!(settings.fade_out_ms, Some(500.0));
        assert_eq!(settings.limiter, LimiterSettings::default());

        let json = serde_json::to_value(&settings).unwrap();
        assert!(json.get("outputGain").is_some());
        assert!(json["multiband"]["bands"][0].get("lowFreq").is_some());
    }
}
