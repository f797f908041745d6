//! Settings deltas against a live graph
//!
//! Only fields that differ between the previously applied settings and the
//! new ones are written, each as a smoothed move starting at `now`. Untouched
//! parameters keep whatever automation they already carry.

use tracing::debug;

use crate::graph::SignalGraph;
use crate::settings::EngineSettings;

/// Counts the writes a delta schedules
#[derive(Debug, Default)]
struct Delta {
    writes: usize,
}

impl Delta {
    fn changed<T: PartialEq>(&mut self, prev: T, next: T) -> bool {
        let differs = prev != next;
        if differs {
            self.writes += 1;
        }
        differs
    }
}

/// Apply the difference between `prev` and `next` to `graph`
///
/// # Arguments
/// * `graph` - Live graph
/// * `prev` - Settings the graph currently reflects
/// * `next` - Settings to move to (already sanitized)
/// * `now` - Context time the edits start at
///
/// Returns the number of parameter writes scheduled.
pub fn apply_delta(
    graph: &mut SignalGraph,
    prev: &EngineSettings,
    next: &EngineSettings,
    now: f64,
) -> usize {
    let mut delta = Delta::default();

    if delta.changed(prev.input_gain, next.input_gain) {
        graph.input_gain_mut().set_gain_db(next.input_gain, now);
    }
    if delta.changed(prev.output_gain, next.output_gain) {
        graph.output_gain_mut().set_gain_db(next.output_gain, now);
    }

    // compressor
    let (p, n) = (&prev.compressor, &next.compressor);
    let stage = graph.compressor_mut();
    if delta.changed(p.threshold, n.threshold) {
        stage.set_threshold(n.threshold, now);
    }
    if delta.changed(p.ratio, n.ratio) {
        stage.set_ratio(n.ratio, now);
    }
    if delta.changed(p.attack, n.attack) {
        stage.set_attack(n.attack, now);
    }
    if delta.changed(p.release, n.release) {
        stage.set_release(n.release, now);
    }
    if delta.changed(p.gain, n.gain) {
        stage.set_makeup_db(n.gain, now);
    }

    // limiter
    if delta.changed(prev.limiter.threshold, next.limiter.threshold) {
        graph.limiter_mut().set_threshold(next.limiter.threshold, now);
    }

    // reverb
    let (p, n) = (&prev.reverb, &next.reverb);
    let stage = graph.reverb_mut();
    if delta.changed(p.mix, n.mix) {
        stage.set_mix(n.mix, now);
    }
    if delta.changed(p.size, n.size) {
        stage.set_size(n.size, now);
    }
    if delta.changed(p.decay, n.decay) {
        stage.set_decay(n.decay, now);
    }
    if delta.changed(p.damping, n.damping) {
        stage.set_damping(n.damping, now);
    }

    // a disabled width stage only remembers the amount
    if delta.changed(prev.stereo_width.width, next.stereo_width.width) {
        graph.width_mut().set_width(next.stereo_width.width, now);
    }

    let stage = graph.multiband_mut();
    let bands = prev.multiband.bands.iter().zip(&next.multiband.bands);
    for (i, (p, n)) in bands.enumerate() {
        if delta.changed(p.low_freq, n.low_freq) {
            stage.set_band_low_freq(i, n.low_freq, now);
        }
        if delta.changed(p.high_freq, n.high_freq) {
            stage.set_band_high_freq(i, n.high_freq, now);
        }
        if delta.changed(p.threshold, n.threshold) {
            stage.set_band_threshold(i, n.threshold, now);
        }
        if delta.changed(p.ratio, n.ratio) {
            stage.set_band_ratio(i, n.ratio, now);
        }
        if delta.changed(p.gain, n.gain) {
            stage.set_band_gain(i, n.gain, now);
        }
        if delta.changed(p.active, n.active) {
            stage.set_band_active(i, n.active, now);
        }
    }

    // toggles last so a re-enabled width stage picks up the new amount
    let toggles = [
        (prev.multiband.enabled, next.multiband.enabled),
        (prev.compressor.enabled, next.compressor.enabled),
        (prev.reverb.enabled, next.reverb.enabled),
        (prev.stereo_width.enabled, next.stereo_width.enabled),
        (prev.limiter.enabled, next.limiter.enabled),
    ];
    for (stage, (was, is)) in graph.stages_mut().into_iter().zip(toggles) {
        if delta.changed(was, is) {
            debug!(stage = stage.name(), enabled = is, "toggling stage");
            stage.set_enabled(is, now);
        }
    }

    debug!(writes = delta.writes, now, "applied settings delta");
    delta.writes
}
