//! Export Module
//!
//! Offline rendering and serialization of the mastered audio:
//! - WAV 16/24/32-bit at the source rate is written directly
//! - other sample rates and compressed codecs go through a [`Transcoder`]
//!   fed with a 32-bit float WAV intermediate
//! - an unavailable transcoder falls back to the intermediate WAV with a warning

pub mod offline;
pub mod transcoder;
pub mod wav;

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::config::{check_sample_rate, EngineConfig};
use crate::engine::AudioAsset;
use crate::error::{EngineError, Result};
use crate::loudness::{LoudnessMeter, LoudnessSnapshot};
use crate::settings::EngineSettings;

pub use offline::OfflineRenderer;
pub use transcoder::{NoTranscoder, PcmTranscoder, TranscodeTarget, Transcoded, Transcoder};
pub use wav::{encode_wav, BitDepth, WAV_HEADER_LEN, WAV_MEDIA_TYPE};

/// Requested export format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportFormat {
    /// Uncompressed WAV; `sample_rate: None` keeps the source rate
    Wav {
        sample_rate: Option<u32>,
        bit_depth: BitDepth,
    },
    /// Compressed codec handled by the transcoder
    Compressed { codec: String, bitrate_kbps: u32 },
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat::Wav {
            sample_rate: None,
            bit_depth: BitDepth::Int16,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Wav {
                sample_rate: None,
                bit_depth,
            } => write!(f, "wav{}", bit_depth.bits()),
            ExportFormat::Wav {
                sample_rate: Some(rate),
                bit_depth,
            } => write!(f, "wav{}@{}", bit_depth.bits(), rate),
            ExportFormat::Compressed {
                codec,
                bitrate_kbps,
            } => write!(f, "{}:{}", codec, bitrate_kbps),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = EngineError;

    /// Parse `wav16`, `wav24`, `wav32`, `wav24@96000` or `codec:kbps`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || EngineError::InvalidConfig {
            field: "format".to_string(),
            value: s.to_string(),
            expected: "wav16, wav24, wav32, wavNN@RATE or codec:kbps".to_string(),
        };

        if let Some(rest) = s.strip_prefix("wav") {
            let (bits, rate) = match rest.split_once('@') {
                Some((bits, rate)) => {
                    let rate = rate.parse::<u32>().map_err(|_| invalid())?;
                    (bits, Some(check_sample_rate("format", rate)?))
                }
                None => (rest, None),
            };
            let bits = if bits.is_empty() { "16" } else { bits };
            let bit_depth = BitDepth::from_bits(bits.parse().map_err(|_| invalid())?)?;
            return Ok(ExportFormat::Wav {
                sample_rate: rate,
                bit_depth,
            });
        }

        let (codec, kbps) = s.split_once(':').unwrap_or((s, "320"));
        if codec.is_empty() {
            return Err(invalid());
        }
        Ok(ExportFormat::Compressed {
            codec: codec.to_ascii_lowercase(),
            bitrate_kbps: kbps.parse().map_err(|_| invalid())?,
        })
    }
}

/// Result of an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedAudio {
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Set when the requested format could not be produced
    pub warning: Option<String>,
}

/// Renders and encodes assets
pub struct Exporter {
    renderer: OfflineRenderer,
    transcoder: Box<dyn Transcoder>,
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    pub fn new(config: EngineConfig, transcoder: Box<dyn Transcoder>) -> Self {
        Self {
            renderer: OfflineRenderer::new(config),
            transcoder,
        }
    }

    /// Exporter with the built-in PCM transcoder
    pub fn with_pcm_transcoder(config: EngineConfig) -> Self {
        Self::new(config, Box::new(PcmTranscoder))
    }

    /// Render `asset` through the chain and encode it as `format`
    pub fn export(
        &self,
        asset: &AudioAsset,
        settings: &EngineSettings,
        format: &ExportFormat,
    ) -> Result<ExportedAudio> {
        let source_rate = asset.sample_rate();
        let channels = asset.num_channels() as u16;
        if let ExportFormat::Wav {
            sample_rate: Some(rate),
            ..
        } = format
        {
            check_sample_rate("sample_rate", *rate)?;
        }

        let target = match format {
            ExportFormat::Wav {
                sample_rate,
                bit_depth,
            } if sample_rate.map_or(true, |rate| rate == source_rate) => {
                let rendered = self.renderer.render(asset, settings, source_rate)?;
                info!(format = %format, "export written directly");
                return Ok(ExportedAudio {
                    bytes: encode_wav(&rendered, *bit_depth)?,
                    media_type: WAV_MEDIA_TYPE.to_string(),
                    sample_rate: source_rate,
                    channels,
                    warning: None,
                });
            }
            ExportFormat::Wav {
                sample_rate,
                bit_depth,
            } => TranscodeTarget::Pcm {
                sample_rate: sample_rate.unwrap_or(source_rate),
                bit_depth: *bit_depth,
            },
            ExportFormat::Compressed {
                codec,
                bitrate_kbps,
            } => TranscodeTarget::Codec {
                name: codec.clone(),
                bitrate_kbps: *bitrate_kbps,
            },
        };

        // compressed targets render at the source rate
        let render_rate = match target {
            TranscodeTarget::Pcm { sample_rate, .. } => sample_rate,
            TranscodeTarget::Codec { .. } => source_rate,
        };
        let rendered = self.renderer.render(asset, settings, render_rate)?;
        let intermediate = encode_wav(&rendered, BitDepth::Float32)?;

        match self.transcoder.transcode(&intermediate, &target) {
            Ok(transcoded) => {
                info!(%target, bytes = transcoded.bytes.len(), "export transcoded");
                Ok(ExportedAudio {
                    bytes: transcoded.bytes,
                    media_type: transcoded.media_type,
                    sample_rate: render_rate,
                    channels,
                    warning: None,
                })
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "transcoder unavailable, exporting WAV instead");
                Ok(ExportedAudio {
                    bytes: intermediate,
                    media_type: WAV_MEDIA_TYPE.to_string(),
                    sample_rate: render_rate,
                    channels,
                    warning: Some(e.friendly_message()),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Measure the loudness of the mastered render of `asset`
///
/// Renders at the asset's own rate and runs a fresh meter over the whole
/// output.
pub fn analyze_offline(
    asset: &AudioAsset,
    settings: &EngineSettings,
    config: &EngineConfig,
) -> Result<LoudnessSnapshot> {
    let rendered = OfflineRenderer::new(config.clone()).render(asset, settings, asset.sample_rate())?;
    Ok(LoudnessMeter::measure(
        &rendered,
        &config.loudness,
        config.analysis_frame_size,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("wav16", ExportFormat::Wav { sample_rate: None, bit_depth: BitDepth::Int16 } ; "wav16")]
    #[test_case("wav24@96000", ExportFormat::Wav { sample_rate: Some(96000), bit_depth: BitDepth::Int24 } ; "hires")]
    #[test_case("MP3:192", ExportFormat::Compressed { codec: "mp3".to_string(), bitrate_kbps: 192 } ; "codec")]
    #[test_case("flac", ExportFormat::Compressed { codec: "flac".to_string(), bitrate_kbps: 320 } ; "codec default bitrate")]
    fn test_parse_format(text: &str, expected: ExportFormat) {
        assert_eq!(text.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test_case("wav12" ; "bad depth")]
    #[test_case("wav24@fast" ; "bad rate")]
    #[test_case("mp3:loud" ; "bad bitrate")]
    #[test_case("wav16@0" ; "zero rate")]
    #[test_case("wav24@4000000000" ; "rate above range")]
    #[test_case("wav24@7999" ; "rate below range")]
    fn test_parse_format_rejects(text: &str) {
        assert!(text.parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let format = ExportFormat::Wav {
            sample_rate: Some(88200),
            bit_depth: BitDepth::Float32,
        };
        assert_eq!(format.to_string().parse::<ExportFormat>().unwrap(), format);
    }
}
