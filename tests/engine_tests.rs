//! Engine Tests
//!
//! Transport behaviour of a full session: loading, play/pause/seek/stop,
//! end-of-playback notifications and live settings.

use masterchain::engine::{generate_test_tone, Transport};
use masterchain::{
    AudioAsset, AudioBuffer, Engine, EngineConfig, EngineEvent, EngineSettings, TransportState,
    WavDecoder,
};

const RATE: u32 = 48000;

fn loaded(seconds: f32) -> Engine {
    let mut engine = Engine::init(EngineConfig::default()).unwrap();
    let tone = generate_test_tone(1000.0, 0.25, seconds, 2, RATE);
    engine.load_asset(AudioAsset::new(tone).unwrap()).unwrap();
    engine
}

fn render_frames(engine: &mut Engine, frames: usize) -> AudioBuffer {
    let mut out = AudioBuffer::new(engine.num_channels().max(1), frames, RATE);
    engine.render(&mut out);
    out
}

// === Transport Tests ===

#[test]
fn test_operations_before_load() {
    let mut engine = Engine::init(EngineConfig::default()).unwrap();
    assert_eq!(engine.state(), TransportState::Unloaded);
    assert_eq!(engine.play().unwrap_err().error_code(), "NOT_LOADED");
    assert_eq!(engine.pause().unwrap_err().error_code(), "NOT_LOADED");
    assert_eq!(engine.seek(1.0).unwrap_err().error_code(), "NOT_LOADED");
    engine.stop();
    assert_eq!(engine.state(), TransportState::Unloaded);
}

#[test]
fn test_play_renders_audio() {
    let mut engine = loaded(1.0);
    assert!(render_frames(&mut engine, 4800).peak_db() <= -96.0);

    engine.play().unwrap();
    let out = render_frames(&mut engine, 4800);
    assert!(out.rms_db(0) > -20.0);
    assert_eq!(engine.position_secs(), 0.1);
}

#[test]
fn test_pause_resume_within_one_quantum() {
    let mut engine = loaded(2.0);
    engine.play().unwrap();
    render_frames(&mut engine, 10_000);
    engine.pause().unwrap();
    let paused_at = engine.position_secs();
    assert_eq!(engine.state(), TransportState::Paused);

    // paused output advances the clock but not the playhead
    render_frames(&mut engine, 4096);
    assert_eq!(engine.position_secs(), paused_at);

    engine.play().unwrap();
    let quantum = 128.0 / RATE as f64;
    assert!((engine.position_secs() - paused_at).abs() < quantum);
    assert!((paused_at - 10_000.0 / RATE as f64).abs() < quantum);
}

#[test]
fn test_seek_while_playing_suppresses_old_end() {
    let mut engine = loaded(2.0);
    engine.play().unwrap();
    render_frames(&mut engine, 91_200); // 1.9 s

    engine.seek(0.5).unwrap();
    assert_eq!(engine.position_secs(), 0.5);

    // past the point where the first source would have run out
    render_frames(&mut engine, 14_400);
    let events = engine.tick();
    assert!(!events.contains(&EngineEvent::Ended));
    assert_eq!(engine.state(), TransportState::Playing);
    assert!((engine.position_secs() - 0.8).abs() < 1e-9);
}

#[test]
fn test_seek_clamps_to_duration() {
    let mut engine = loaded(1.0);
    engine.seek(30.0).unwrap();
    assert_eq!(engine.position_secs(), 1.0);
    engine.seek(-1.0).unwrap();
    assert_eq!(engine.position_secs(), 0.0);
    assert_eq!(engine.state(), TransportState::Stopped);
}

#[test]
fn test_seek_between_frames_snaps_to_nearest() {
    let mut engine = loaded(1.0);
    for t in [0.123456, 0.5 + 0.3 / RATE as f64, 0.75 + 0.7 / RATE as f64] {
        engine.seek(t).unwrap();
        let position = engine.position_secs();
        assert!((position - t).abs() <= 0.5 / RATE as f64, "{} -> {}", t, position);
        // whole frames only
        let frames = position * RATE as f64;
        assert!((frames - frames.round()).abs() < 1e-6);
    }
}

#[test]
fn test_natural_end() {
    let mut engine = loaded(0.5);
    engine.tick();
    engine.play().unwrap();
    engine.tick();
    render_frames(&mut engine, 30_000);

    let events = engine.tick();
    assert_eq!(
        events,
        vec![
            EngineEvent::Position {
                position_secs: 0.0,
                duration_secs: 0.5
            },
            EngineEvent::StateChanged(TransportState::Stopped),
            EngineEvent::Ended,
        ]
    );
    assert_eq!(engine.position_secs(), 0.0);
    assert!(engine.tick().is_empty());
}

#[test]
fn test_stop_is_idempotent() {
    let mut engine = loaded(1.0);
    engine.play().unwrap();
    render_frames(&mut engine, 1024);
    engine.stop();
    engine.stop();
    assert_eq!(engine.state(), TransportState::Stopped);
    assert_eq!(engine.position_secs(), 0.0);
}

#[test]
fn test_load_resamples_to_context_rate() {
    let mut engine = Engine::init(EngineConfig::default()).unwrap();
    let tone = generate_test_tone(440.0, 0.5, 1.0, 1, 44100);
    engine.load_asset(AudioAsset::new(tone).unwrap()).unwrap();
    assert!((engine.duration_secs() - 1.0).abs() < 1e-4);
    assert_eq!(engine.asset().map(|a| a.sample_rate()), Some(44100));
}

#[test]
fn test_load_from_wav_bytes() {
    let tone = generate_test_tone(440.0, 0.5, 0.25, 2, RATE);
    let bytes = masterchain::export::encode_wav(&tone, masterchain::export::BitDepth::Int16).unwrap();

    let mut engine = Engine::init(EngineConfig::default()).unwrap();
    engine.load(&bytes, &WavDecoder).unwrap();
    assert_eq!(engine.state(), TransportState::Stopped);
    assert_eq!(engine.num_channels(), 2);
}

#[test]
fn test_transport_positions_are_frame_exact() {
    let mut transport = Transport::new(RATE, 0);
    transport.load(RATE as usize * 3);
    for _ in 0..100 {
        transport.play().unwrap();
        transport.pause().unwrap();
    }
    assert_eq!(transport.position_frames(), 0);
}

// === Live Settings Tests ===

#[test]
fn test_output_gain_applies_while_playing() {
    let mut engine = loaded(2.0);
    let mut settings = EngineSettings::default();
    settings.limiter.enabled = false;
    engine.apply_settings(&settings);
    engine.play().unwrap();
    // skip the start-of-playback ramp
    render_frames(&mut engine, 960);
    let before = render_frames(&mut engine, 9600).rms_db(0);

    settings.output_gain = -12.0;
    engine.apply_settings(&settings);
    render_frames(&mut engine, 9600);
    let after = render_frames(&mut engine, 9600).rms_db(0);
    assert!((before - after - 12.0).abs() < 0.1);
}

#[test]
fn test_recalled_settings_reach_the_live_graph() {
    let mut engine = loaded(2.0);
    let mut settings = EngineSettings::default();
    settings.limiter.enabled = false;
    engine.recall_settings(&settings);
    engine.play().unwrap();
    render_frames(&mut engine, 960);
    let before = render_frames(&mut engine, 9600).rms_db(0);

    let mut preset = settings.clone();
    preset.output_gain = -12.0;
    preset.compressor.ratio = 99.0;
    engine.recall_settings(&preset);
    assert_eq!(engine.settings(), &preset.sanitized());
    render_frames(&mut engine, 9600);
    let after = render_frames(&mut engine, 9600).rms_db(0);
    assert!((before - after - 12.0).abs() < 0.1);

    // deltas continue from the recalled snapshot
    let later = engine.current_time() + 1.0;
    preset.compressor.enabled = true;
    engine.apply_settings(&preset);
    let graph = engine.graph().unwrap();
    assert_eq!(graph.compressor().bypass().coefficients_at(later), (1.0, 0.0));
}

#[test]
fn test_compare_original_bypasses_chain() {
    let mut engine = loaded(2.0);
    let mut settings = EngineSettings::default();
    settings.input_gain = -20.0;
    engine.apply_settings(&settings);
    engine.play().unwrap();
    let processed = render_frames(&mut engine, 9600).rms_db(0);

    engine.set_compare_original(true);
    render_frames(&mut engine, 9600);
    let original = render_frames(&mut engine, 9600).rms_db(0);
    assert!(original - processed > 15.0);
}

#[test]
fn test_analysis_snapshot_follows_sessions() {
    let mut engine = loaded(2.0);
    assert!(engine.analysis_snapshot().is_none());

    engine.play().unwrap();
    render_frames(&mut engine, 24_000);
    let snapshot = engine.analysis_snapshot().unwrap();
    assert_eq!(snapshot.spectrum.len(), 1024);
    assert!(snapshot.loudness.momentary > -30.0);

    engine.stop();
    let snapshot = engine.analysis_snapshot().unwrap();
    assert_eq!(snapshot.loudness.integrated, -70.0);
}
