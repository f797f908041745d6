//! Graph Tests
//!
//! Topology invariants of the mastering chain: complementary bypass gains,
//! click-free toggling, the width identity and band contiguity.

use masterchain::engine::generate_test_tone;
use masterchain::graph::{apply_delta, BlockClock, BypassMix, SignalGraph};
use masterchain::settings::{BandEdge, MultibandSettings, MAX_FREQUENCY, MIN_FREQUENCY};
use masterchain::{AudioBuffer, EngineConfig, EngineSettings};

const RATE: u32 = 48000;

fn build(settings: &EngineSettings, channels: usize) -> SignalGraph {
    SignalGraph::build(&EngineConfig::default(), RATE, channels, settings, false)
}

/// Run `input` through the graph in 128-frame blocks, calling `edit` before
/// each block with the block's start time
fn run_with<F>(graph: &mut SignalGraph, input: &AudioBuffer, mut edit: F) -> AudioBuffer
where
    F: FnMut(&mut SignalGraph, f64),
{
    let channels = input.num_channels();
    let mut output = input.clone();
    let mut start = 0;
    while start < input.num_samples() {
        let end = (start + 128).min(input.num_samples());
        let clock = BlockClock::new(start as u64, RATE);
        edit(graph, clock.time());

        let mut block = AudioBuffer::new(channels, end - start, RATE);
        for ch in 0..channels {
            block.samples[ch].copy_from_slice(&input.samples[ch][start..end]);
        }
        graph.process(&mut block, &clock);
        for ch in 0..channels {
            output.samples[ch][start..end].copy_from_slice(&block.samples[ch]);
        }
        start = end;
    }
    output
}

fn bypass_mixes(graph: &SignalGraph) -> Vec<&BypassMix> {
    vec![
        graph.multiband().bypass(),
        graph.compressor().bypass(),
        graph.reverb().bypass(),
        graph.width().bypass(),
        graph.limiter().bypass(),
        graph.compare(),
    ]
}

// === Bypass Tests ===

#[test]
fn test_bypass_gains_sum_to_one_through_toggles() {
    let prev = EngineSettings::default();
    let mut next = prev.clone();
    next.multiband.enabled = true;
    next.compressor.enabled = true;
    next.reverb.enabled = true;
    next.stereo_width.enabled = true;
    next.limiter.enabled = false;

    let mut graph = build(&prev, 2);
    apply_delta(&mut graph, &prev, &next, 0.1);
    apply_delta(&mut graph, &next, &prev, 0.103);
    graph.set_compare_original(true, 0.105);

    for i in 0..400 {
        let t = 0.09 + i as f64 * 0.0001;
        for mix in bypass_mixes(&graph) {
            let (active, bypass) = mix.coefficients_at(t);
            assert!((active + bypass - 1.0).abs() < 1e-6, "t = {}", t);
            assert!((0.0..=1.0).contains(&active));
        }
    }
}

#[test]
fn test_toggling_limiter_never_drops_level() {
    // well below the ceiling both paths carry the same signal
    let mut settings = EngineSettings::default();
    settings.limiter.enabled = true;
    let mut graph = build(&settings, 2);
    let tone = generate_test_tone(1000.0, 0.1, 0.5, 2, RATE);

    let mut toggled = settings.clone();
    toggled.limiter.enabled = false;
    let mut current = settings.clone();
    let output = run_with(&mut graph, &tone, |graph, t| {
        // flip every 50 ms
        let want_enabled = ((t / 0.05) as usize) % 2 == 0;
        if current.limiter.enabled != want_enabled {
            let next = if want_enabled { &settings } else { &toggled };
            apply_delta(graph, &current, next, t);
            current = next.clone();
        }
    });

    for window in (1024..output.num_samples() - 480).step_by(480) {
        let level = masterchain::engine::buffer::rms_db(&output.samples[0][window..window + 480]);
        assert!(level > -24.0, "level dipped to {} dB at {}", level, window);
    }
}

// === Stereo Width Tests ===

#[test]
fn test_width_hundred_percent_is_identity() {
    let mut settings = EngineSettings::default();
    settings.limiter.enabled = false;
    settings.stereo_width.enabled = true;
    settings.stereo_width.width = 100.0;
    let mut graph = build(&settings, 2);

    let mut input = generate_test_tone(440.0, 0.5, 0.1, 2, RATE);
    for s in &mut input.samples[1] {
        *s *= -0.3;
    }
    let output = run_with(&mut graph, &input, |_, _| {});
    for ch in 0..2 {
        for (a, b) in output.samples[ch].iter().zip(&input.samples[ch]) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}

#[test]
fn test_zero_width_folds_to_mono() {
    let mut settings = EngineSettings::default();
    settings.limiter.enabled = false;
    settings.stereo_width.enabled = true;
    settings.stereo_width.width = 0.0;
    let mut graph = build(&settings, 2);

    let mut input = generate_test_tone(440.0, 0.5, 0.1, 2, RATE);
    input.samples[1].fill(0.0);
    let output = run_with(&mut graph, &input, |_, _| {});
    for (l, r) in output.samples[0].iter().zip(&output.samples[1]) {
        assert!((l - r).abs() < 1e-6);
    }
}

#[test]
fn test_mono_asset_passes_width_stage() {
    let mut settings = EngineSettings::default();
    settings.limiter.enabled = false;
    settings.stereo_width.enabled = true;
    settings.stereo_width.width = 200.0;
    let mut graph = build(&settings, 1);
    let input = generate_test_tone(440.0, 0.5, 0.05, 1, RATE);
    let output = run_with(&mut graph, &input, |_, _| {});
    assert_eq!(output, input);
}

// === Multiband Contiguity Tests ===

/// Small deterministic generator so the edit sequence is reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn frequency(&mut self) -> f32 {
        // log-uniform 1 Hz .. 40 kHz, deliberately out of range at both ends
        let unit = (self.next() % 10_000) as f32 / 10_000.0;
        10f32.powf(unit * 4.6)
    }
}

#[test]
fn test_band_edits_keep_contiguity() {
    let mut bands = MultibandSettings::default();
    let mut rng = Lcg(7);
    for _ in 0..500 {
        let index = (rng.next() % 5) as usize;
        let edge = if rng.next() % 2 == 0 {
            BandEdge::Low
        } else {
            BandEdge::High
        };
        bands.set_band_edge(index, edge, rng.frequency());
        assert!(bands.is_contiguous(), "{:?}", bands.crossovers());
        assert_eq!(bands.bands[0].low_freq, MIN_FREQUENCY);
        assert_eq!(bands.bands[4].high_freq, MAX_FREQUENCY);
    }
}

#[test]
fn test_live_band_edges_stay_joined() {
    let mut prev = EngineSettings::default();
    prev.multiband.enabled = true;
    let mut graph = build(&prev, 2);
    let mut rng = Lcg(42);

    for step in 0..50 {
        let mut next = prev.clone();
        let index = (rng.next() % 4) as usize;
        next.multiband.set_crossover(index, rng.frequency());
        let now = step as f64 * 0.01;
        apply_delta(&mut graph, &prev, &next, now);

        for at in [now, now + 0.003, now + 0.02] {
            for i in 0..4 {
                let (_, high) = graph.multiband().band_edges_at(i, at).unwrap();
                let (low, _) = graph.multiband().band_edges_at(i + 1, at).unwrap();
                assert_eq!(high, low);
            }
        }
        prev = next;
    }
}

#[test]
fn test_sanitized_settings_are_contiguous() {
    let json = r#"{ "multiband": { "enabled": true, "bands": [
        { "name": "a", "lowFreq": 5, "highFreq": 900, "threshold": -20, "ratio": 2, "gain": 0, "active": true },
        { "name": "b", "lowFreq": 300, "highFreq": 100, "threshold": -20, "ratio": 2, "gain": 0, "active": true }
    ] } }"#;
    let settings = EngineSettings::from_json_str(json).unwrap();
    assert_eq!(settings.multiband.bands.len(), 5);
    assert!(settings.multiband.is_contiguous());
}
