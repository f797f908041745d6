//! Transport State Machine
//!
//! `Unloaded → Stopped ⇄ Playing ⇄ Paused`. While playing, the live
//! [`OneShotSource`] lives inside the phase itself, so replacing or stopping it
//! drops the old source and its end can never be observed afterwards.
//!
//! Positions are kept in frames of the loaded audio at the context rate so
//! pause/resume cycles never accumulate rounding drift.

use std::fmt;

use tracing::debug;

use crate::engine::source::OneShotSource;
use crate::error::{EngineError, Result};

/// Transport states visible to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Nothing loaded (default state)
    #[default]
    Unloaded,
    /// Loaded, idle at a position
    Stopped,
    /// A source is rendering
    Playing,
    /// Idle, resumable at a position
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Unloaded => write!(f, "Unloaded"),
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Paused => write!(f, "Paused"),
        }
    }
}

#[derive(Debug)]
enum TransportPhase {
    Unloaded,
    Stopped { position: usize },
    Playing { source: OneShotSource },
    Paused { position: usize },
}

/// Playback state machine for one loaded asset
#[derive(Debug)]
pub struct Transport {
    phase: TransportPhase,
    sample_rate: u32,
    duration_frames: usize,
    declick_frames: usize,
    next_source_id: u64,
}

impl Transport {
    /// Create a transport with nothing loaded
    ///
    /// # Arguments
    /// * `sample_rate` - Context sample rate positions are counted in
    /// * `declick_frames` - Fade-in length for every new source
    pub fn new(sample_rate: u32, declick_frames: usize) -> Self {
        Self {
            phase: TransportPhase::Unloaded,
            sample_rate,
            duration_frames: 0,
            declick_frames,
            next_source_id: 1,
        }
    }

    pub fn state(&self) -> TransportState {
        match self.phase {
            TransportPhase::Unloaded => TransportState::Unloaded,
            TransportPhase::Stopped { .. } => TransportState::Stopped,
            TransportPhase::Playing { .. } => TransportState::Playing,
            TransportPhase::Paused { .. } => TransportState::Paused,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.phase, TransportPhase::Playing { .. })
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self.phase, TransportPhase::Unloaded)
    }

    /// Current position in frames
    pub fn position_frames(&self) -> usize {
        match &self.phase {
            TransportPhase::Unloaded => 0,
            TransportPhase::Stopped { position } | TransportPhase::Paused { position } => *position,
            TransportPhase::Playing { source } => source.position_frames(),
        }
    }

    /// Current position in seconds
    pub fn position_secs(&self) -> f64 {
        self.frames_to_secs(self.position_frames())
    }

    /// Duration of the loaded audio in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames_to_secs(self.duration_frames)
    }

    /// The live source, while playing
    pub fn source_mut(&mut self) -> Option<&mut OneShotSource> {
        match &mut self.phase {
            TransportPhase::Playing { source } => Some(source),
            _ => None,
        }
    }

    fn frames_to_secs(&self, frames: usize) -> f64 {
        frames as f64 / self.sample_rate as f64
    }

    fn secs_to_frames(&self, secs: f64) -> usize {
        let secs = if secs.is_finite() { secs } else { 0.0 };
        let frames = (secs.max(0.0) * self.sample_rate as f64).round() as usize;
        frames.min(self.duration_frames)
    }

    fn new_source(&mut self, start_frame: usize) -> OneShotSource {
        let id = self.next_source_id;
        self.next_source_id += 1;
        debug!(source = id, start_frame, "creating playback source");
        OneShotSource::new(id, start_frame, self.duration_frames, self.declick_frames)
    }

    fn require_loaded(&self, operation: &str) -> Result<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(EngineError::not_loaded(operation))
        }
    }

    /// Take the phase out, leaving `Unloaded` in its place
    fn take_phase(&mut self) -> TransportPhase {
        std::mem::replace(&mut self.phase, TransportPhase::Unloaded)
    }

    /// Accept newly loaded audio: any source is stopped, position resets to 0
    pub fn load(&mut self, duration_frames: usize) {
        if let TransportPhase::Playing { source } = self.take_phase() {
            debug!(source = source.id(), "stopping source for new asset");
            source.stop();
        }
        self.duration_frames = duration_frames;
        self.phase = TransportPhase::Stopped { position: 0 };
        debug!(duration_frames, "transport loaded");
    }

    /// Forget the loaded audio
    pub fn unload(&mut self) {
        self.take_phase();
        self.duration_frames = 0;
    }

    /// Start playback from the stored position
    ///
    /// Returns `true` when a new source was started, `false` when already
    /// playing.
    pub fn play(&mut self) -> Result<bool> {
        self.require_loaded("play")?;
        let position = match self.take_phase() {
            TransportPhase::Playing { source } => {
                debug!("already playing");
                self.phase = TransportPhase::Playing { source };
                return Ok(false);
            }
            TransportPhase::Stopped { position } | TransportPhase::Paused { position } => position,
            TransportPhase::Unloaded => 0,
        };
        let source = self.new_source(position);
        debug!(position_secs = self.frames_to_secs(position), "play");
        self.phase = TransportPhase::Playing { source };
        Ok(true)
    }

    /// Pause playback, keeping the position
    pub fn pause(&mut self) -> Result<()> {
        self.require_loaded("pause")?;
        self.phase = match self.take_phase() {
            TransportPhase::Playing { source } => {
                let position = source.stop();
                debug!(position_secs = self.frames_to_secs(position), "paused");
                TransportPhase::Paused { position }
            }
            other => other,
        };
        Ok(())
    }

    /// Move the playhead, clamped to `[0, duration]`
    ///
    /// The target snaps to the nearest frame, so `position_secs()` afterwards
    /// can differ from `position_secs` by up to half a sample period.
    /// While playing the current source is replaced by one starting at the
    /// target. Returns `true` when playback restarted.
    pub fn seek(&mut self, position_secs: f64) -> Result<bool> {
        self.require_loaded("seek")?;
        let target = self.secs_to_frames(position_secs);
        let restarted;
        self.phase = match self.take_phase() {
            TransportPhase::Playing { source } => {
                source.stop();
                restarted = true;
                TransportPhase::Playing {
                    source: self.new_source(target),
                }
            }
            TransportPhase::Paused { .. } => {
                restarted = false;
                TransportPhase::Paused { position: target }
            }
            _ => {
                restarted = false;
                TransportPhase::Stopped { position: target }
            }
        };
        debug!(position_secs = self.frames_to_secs(target), restarted, "seek");
        Ok(restarted)
    }

    /// Stop playback and rewind to 0. Idempotent; a no-op when unloaded.
    pub fn stop(&mut self) {
        match self.take_phase() {
            TransportPhase::Unloaded => {}
            TransportPhase::Playing { source } => {
                debug!(source = source.id(), "stopped");
                source.stop();
                self.phase = TransportPhase::Stopped { position: 0 };
            }
            _ => self.phase = TransportPhase::Stopped { position: 0 },
        }
    }

    /// Detect the live source running out
    ///
    /// Returns `true` exactly once per natural end, after moving to
    /// `Stopped` at position 0.
    pub fn finish_if_ended(&mut self) -> bool {
        let ended = matches!(&self.phase, TransportPhase::Playing { source } if source.is_exhausted());
        if ended {
            if let TransportPhase::Playing { source } = self.take_phase() {
                debug!(source = source.id(), "source reached the end");
            }
            self.phase = TransportPhase::Stopped { position: 0 };
        }
        ended
    }
}
