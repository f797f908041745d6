//! Transcoder collaborator
//!
//! Takes an uncompressed WAV and produces the requested target format, or
//! reports `TranscodeUnavailable` so the exporter can fall back to WAV.

use std::fmt;

use tracing::debug;

use crate::engine::decode::{Decoder, WavDecoder};
use crate::error::{EngineError, Result};
use crate::export::wav::{encode_wav, BitDepth, WAV_MEDIA_TYPE};

/// What a transcode should produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeTarget {
    /// Uncompressed WAV at another rate and/or sample format
    Pcm { sample_rate: u32, bit_depth: BitDepth },
    /// A compressed codec such as `mp3`, `aac`, `ogg` or `flac`
    Codec { name: String, bitrate_kbps: u32 },
}

impl fmt::Display for TranscodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeTarget::Pcm {
                sample_rate,
                bit_depth,
            } => write!(f, "WAV {} Hz {}", sample_rate, bit_depth),
            TranscodeTarget::Codec { name, bitrate_kbps } => {
                write!(f, "{} {} kbps", name.to_uppercase(), bitrate_kbps)
            }
        }
    }
}

/// Encoded bytes with their media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Converts uncompressed WAV bytes into a target format
pub trait Transcoder {
    /// Transcode `wav` into `target`
    ///
    /// Returns `EngineError::TranscodeUnavailable` when the target cannot be
    /// produced.
    fn transcode(&self, wav: &[u8], target: &TranscodeTarget) -> Result<Transcoded>;
}

/// Built-in transcoder for uncompressed targets
///
/// Resamples with a band-limited FFT resampler and re-quantizes. Compressed codecs
/// are reported unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcmTranscoder;

impl Transcoder for PcmTranscoder {
    fn transcode(&self, wav: &[u8], target: &TranscodeTarget) -> Result<Transcoded> {
        match target {
            TranscodeTarget::Pcm {
                sample_rate,
                bit_depth,
            } => {
                let asset = WavDecoder.decode(wav).map_err(|e| unavailable(target, e.to_string()))?;
                debug!(
                    from = asset.sample_rate(),
                    to = *sample_rate,
                    %bit_depth,
                    "requantizing PCM"
                );
                let resampled = asset.resampled(*sample_rate)?;
                Ok(Transcoded {
                    bytes: encode_wav(&resampled, *bit_depth)?,
                    media_type: WAV_MEDIA_TYPE.to_string(),
                })
            }
            TranscodeTarget::Codec { name, .. } => {
                Err(unavailable(target, format!("no {} encoder is built in", name)))
            }
        }
    }
}

/// Transcoder for hosts without one: every target is unavailable
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranscoder;

impl Transcoder for NoTranscoder {
    fn transcode(&self, _wav: &[u8], target: &TranscodeTarget) -> Result<Transcoded> {
        Err(unavailable(target, "no transcoder configured"))
    }
}

fn unavailable(target: &TranscodeTarget, reason: impl Into<String>) -> EngineError {
    EngineError::TranscodeUnavailable {
        target: target.to_string(),
        reason: reason.into(),
    }
}
