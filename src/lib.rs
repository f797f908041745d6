//! Masterchain - Audio Mastering Engine
//!
//! Applies a fixed multi-stage mastering chain to decoded audio, both during
//! interactive playback and in an offline render for export.
//!
//! # Architecture
//!
//! - [`engine`]: the playback session (asset, transport, live graph)
//! - [`graph`]: the processing topology, stages and parameter automation
//! - [`loudness`]: streaming loudness, true peak and loudness range
//! - [`export`]: offline rendering, WAV encoding and transcoding
//! - [`dsp`]: filter, dynamics, delay and stereo kernels the stages wrap

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod loudness;
pub mod settings;

pub use config::{EngineConfig, LoudnessConfig};
pub use engine::{AudioAsset, AudioBuffer, Decoder, Engine, EngineEvent, TransportState, WavDecoder};
pub use error::{EngineError, Result};
pub use export::{ExportFormat, ExportedAudio, Exporter};
pub use loudness::{LoudnessMeter, LoudnessSnapshot};
pub use settings::EngineSettings;
