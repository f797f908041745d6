//! Audio Engine Module
//!
//! The playback session:
//! - Audio buffers, decoded assets and decoding
//! - Transport state machine with one-shot sources
//! - The live signal graph, pulled block by block through [`Engine::render`]

pub mod asset;
pub mod buffer;
pub mod decode;
pub mod resample;
pub mod source;
pub mod transport;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::graph::{apply_delta, AnalysisSnapshot, BlockClock, SignalGraph};
use crate::settings::EngineSettings;

pub use asset::{generate_test_tone, AudioAsset};
pub use buffer::AudioBuffer;
pub use decode::{Decoder, WavDecoder};
pub use transport::{Transport, TransportState};

/// Notifications produced by [`Engine::tick`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Playhead report, emitted on every tick while playing
    Position {
        position_secs: f64,
        duration_secs: f64,
    },
    /// The transport moved to a new state since the previous tick
    StateChanged(TransportState),
    /// Playback reached the end of the asset
    Ended,
}

/// One mastering session
///
/// Owns the loaded asset, the live graph and the transport. Every method
/// takes `&mut self`; the host's audio callback pulls audio with
/// [`Engine::render`] and its frame clock polls [`Engine::tick`] and
/// [`Engine::analysis_snapshot`].
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    settings: EngineSettings,
    asset: Option<AudioAsset>,
    /// Asset at the context sample rate
    playback: Option<AudioBuffer>,
    graph: Option<SignalGraph>,
    transport: Transport,
    compare_original: bool,
    /// Context frames rendered so far; never stops advancing
    clock_frame: u64,
    reported_state: TransportState,
    block: AudioBuffer,
}

impl Engine {
    /// Create a session
    ///
    /// Fails with `InvalidConfig` when `config` is out of range.
    pub fn init(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let declick_frames = (config.declick_secs * config.sample_rate as f64).round() as usize;
        info!(
            sample_rate = config.sample_rate,
            render_quantum = config.render_quantum,
            "engine initialized"
        );
        Ok(Self {
            transport: Transport::new(config.sample_rate, declick_frames),
            block: AudioBuffer::new(0, config.render_quantum, config.sample_rate),
            settings: EngineSettings::default(),
            asset: None,
            playback: None,
            graph: None,
            compare_original: false,
            clock_frame: 0,
            reported_state: TransportState::Unloaded,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn asset(&self) -> Option<&AudioAsset> {
        self.asset.as_ref()
    }

    pub fn graph(&self) -> Option<&SignalGraph> {
        self.graph.as_ref()
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn position_secs(&self) -> f64 {
        self.transport.position_secs()
    }

    pub fn duration_secs(&self) -> f64 {
        self.transport.duration_secs()
    }

    pub fn is_comparing_original(&self) -> bool {
        self.compare_original
    }

    /// Channel count of the loaded asset (0 when nothing is loaded)
    pub fn num_channels(&self) -> usize {
        self.asset.as_ref().map_or(0, AudioAsset::num_channels)
    }

    /// Context time of the next block to render
    pub fn current_time(&self) -> f64 {
        self.clock_frame as f64 / self.config.sample_rate as f64
    }

    /// Decode and load a file
    ///
    /// On a decode failure playback stops and the previously loaded asset,
    /// if any, stays loaded.
    pub fn load(&mut self, bytes: &[u8], decoder: &dyn Decoder) -> Result<()> {
        match decoder.decode(bytes) {
            Ok(asset) => self.load_asset(asset),
            Err(e) => {
                warn!(error = %e, "decode failed, keeping previous audio");
                self.stop();
                Err(e)
            }
        }
    }

    /// Load already decoded audio, replacing the current asset
    ///
    /// # Errors
    /// A failed conversion to the context rate leaves the previous asset
    /// loaded, as a failed decode does.
    pub fn load_asset(&mut self, asset: AudioAsset) -> Result<()> {
        let playback = match asset.resampled(self.config.sample_rate) {
            Ok(playback) => playback,
            Err(e) => {
                warn!(error = %e, "resampling failed, keeping previous audio");
                self.stop();
                return Err(e);
            }
        };
        info!(
            channels = asset.num_channels(),
            source_rate = asset.sample_rate(),
            duration_secs = asset.duration_secs(),
            "audio loaded"
        );
        self.end_session();
        self.transport.load(playback.num_samples());
        self.block = AudioBuffer::new(
            asset.num_channels(),
            self.config.render_quantum,
            self.config.sample_rate,
        );
        self.playback = Some(playback);
        self.asset = Some(asset);
        self.graph = None;
        Ok(())
    }

    /// Start or resume playback
    ///
    /// Builds the graph on first play after a load. A no-op while playing.
    pub fn play(&mut self) -> Result<()> {
        if !self.transport.is_loaded() {
            return Err(EngineError::not_loaded("play"));
        }
        self.ensure_graph();
        if self.transport.play()? {
            self.begin_session();
        }
        Ok(())
    }

    /// Pause playback, keeping the position
    pub fn pause(&mut self) -> Result<()> {
        self.transport.pause()?;
        if let Some(analysis) = self.graph.as_mut().and_then(SignalGraph::analysis_mut) {
            analysis.suspend_session();
        }
        Ok(())
    }

    /// Move the playhead; playback continues from there when playing
    ///
    /// Positions are whole frames at the context rate. A time between two
    /// frames snaps to the nearer one.
    pub fn seek(&mut self, position_secs: f64) -> Result<()> {
        if self.transport.seek(position_secs)? {
            self.begin_session();
        }
        Ok(())
    }

    /// Stop playback and rewind. Safe to call in any state.
    pub fn stop(&mut self) {
        self.transport.stop();
        self.end_session();
    }

    /// Apply a new settings snapshot
    ///
    /// The settings are sanitized first. With a live graph only the changed
    /// fields are scheduled, starting at the next rendered block.
    pub fn apply_settings(&mut self, settings: &EngineSettings) {
        let next = settings.sanitized();
        let now = self.current_time();
        if let Some(graph) = self.graph.as_mut() {
            apply_delta(graph, &self.settings, &next, now);
        }
        self.settings = next;
    }

    /// Replace the settings wholesale, as when the host recalls a preset
    ///
    /// Every parameter of every stage is rescheduled at the next block,
    /// including those equal to the current snapshot, so automation still
    /// in flight from earlier edits is re-anchored on the recalled values.
    pub fn recall_settings(&mut self, settings: &EngineSettings) {
        let next = settings.sanitized();
        let now = self.current_time();
        if let Some(graph) = self.graph.as_mut() {
            debug!(now, "recalling settings");
            graph.apply_settings(&next, now);
        }
        self.settings = next;
    }

    /// Switch the A/B mix between the original and the processed signal
    pub fn set_compare_original(&mut self, original: bool) {
        if self.compare_original == original {
            return;
        }
        debug!(original, "A/B compare");
        self.compare_original = original;
        let now = self.current_time();
        if let Some(graph) = self.graph.as_mut() {
            graph.set_compare_original(original, now);
        }
    }

    /// Render the next block of output into `out`
    ///
    /// `out` may be any length; it is processed in render quanta. Output
    /// channels beyond the asset's are silent. The context clock advances
    /// whether or not anything is loaded or playing.
    pub fn render(&mut self, out: &mut AudioBuffer) {
        let quantum = self.config.render_quantum;
        let total = out.num_samples();
        let mut offset = 0;

        while offset < total {
            let len = quantum.min(total - offset);
            self.block.resize(len);
            self.block.fill_silence();

            if let (Some(source), Some(playback)) =
                (self.transport.source_mut(), self.playback.as_ref())
            {
                source.render(playback, &mut self.block);
            }

            let clock = BlockClock::new(self.clock_frame, self.config.sample_rate);
            if let Some(graph) = self.graph.as_mut() {
                graph.process(&mut self.block, &clock);
            }

            for (ch, channel) in out.samples.iter_mut().enumerate() {
                let dest = &mut channel[offset..offset + len];
                match self.block.samples.get(ch) {
                    Some(rendered) => dest.copy_from_slice(rendered),
                    None => dest.fill(0.0),
                }
            }

            self.clock_frame += len as u64;
            offset += len;
        }
    }

    /// Collect transport events since the previous tick
    ///
    /// Detects the natural end of playback, reports the playhead while
    /// playing and reports state changes.
    pub fn tick(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let duration_secs = self.transport.duration_secs();

        if self.transport.finish_if_ended() {
            info!("playback ended");
            self.end_session();
            events.push(EngineEvent::Position {
                position_secs: 0.0,
                duration_secs,
            });
            events.push(EngineEvent::StateChanged(TransportState::Stopped));
            events.push(EngineEvent::Ended);
            self.reported_state = TransportState::Stopped;
            return events;
        }

        let state = self.transport.state();
        if state != self.reported_state {
            events.push(EngineEvent::StateChanged(state));
            self.reported_state = state;
        }
        if state == TransportState::Playing {
            events.push(EngineEvent::Position {
                position_secs: self.transport.position_secs(),
                duration_secs,
            });
        }
        events
    }

    /// Display data for the latest analysis frame, once a graph exists
    pub fn analysis_snapshot(&mut self) -> Option<AnalysisSnapshot> {
        self.graph
            .as_mut()
            .and_then(SignalGraph::analysis_mut)
            .map(|analysis| analysis.snapshot())
    }

    /// Release the asset and the graph; the session returns to `Unloaded`
    pub fn teardown(&mut self) {
        self.transport.unload();
        self.graph = None;
        self.playback = None;
        self.asset = None;
        info!("engine torn down");
    }

    fn ensure_graph(&mut self) {
        if self.graph.is_some() {
            return;
        }
        let channels = self.num_channels();
        let graph = SignalGraph::build(
            &self.config,
            self.config.sample_rate,
            channels,
            &self.settings,
            true,
        )
        .with_original_selected(self.compare_original);
        debug!(channels, "live graph built");
        self.graph = Some(graph);
    }

    fn begin_session(&mut self) {
        if let Some(analysis) = self.graph.as_mut().and_then(SignalGraph::analysis_mut) {
            analysis.begin_session();
        }
    }

    fn end_session(&mut self) {
        if let Some(analysis) = self.graph.as_mut().and_then(SignalGraph::analysis_mut) {
            analysis.end_session();
        }
    }
}
