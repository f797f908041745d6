//! WAV serialization
//!
//! Encodes an [`AudioBuffer`] as an in-memory WAV file with `hound`.

use std::fmt;
use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

use crate::engine::AudioBuffer;
use crate::error::{EngineError, Result};

/// Media type of every WAV this module produces
pub const WAV_MEDIA_TYPE: &str = "audio/wav";

/// Sample formats the WAV writer supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitDepth {
    /// 16-bit signed integer
    Int16,
    /// 24-bit signed integer
    Int24,
    /// 32-bit IEEE float
    Float32,
}

impl BitDepth {
    /// Parse a bit count (16, 24 or 32)
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(BitDepth::Int16),
            24 => Ok(BitDepth::Int24),
            32 => Ok(BitDepth::Float32),
            _ => Err(EngineError::InvalidConfig {
                field: "bit_depth".to_string(),
                value: bits.to_string(),
                expected: "16, 24 or 32".to_string(),
            }),
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        }
    }

    /// Bytes per sample in the data chunk
    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    fn sample_format(self) -> SampleFormat {
        match self {
            BitDepth::Float32 => SampleFormat::Float,
            _ => SampleFormat::Int,
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitDepth::Float32 => write!(f, "32-bit float"),
            other => write!(f, "{}-bit", other.bits()),
        }
    }
}

/// Smallest header hound writes (RIFF + plain `fmt ` + `data` chunk headers)
pub const WAV_HEADER_LEN: usize = 44;

fn wav_error(e: hound::Error) -> EngineError {
    EngineError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

/// Encode `buffer` as a WAV file
///
/// # Arguments
/// * `buffer` - Audio to encode, written at its own sample rate
/// * `bit_depth` - Sample format of the data chunk
pub fn encode_wav(buffer: &AudioBuffer, bit_depth: BitDepth) -> Result<Vec<u8>> {
    let channels = u16::try_from(buffer.num_channels())
        .ok()
        .filter(|&c| c > 0)
        .ok_or_else(|| EngineError::Render {
            reason: format!("cannot write {} channels to WAV", buffer.num_channels()),
        })?;

    let spec = WavSpec {
        channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: bit_depth.bits(),
        sample_format: bit_depth.sample_format(),
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
        let interleaved = buffer.to_interleaved();
        match bit_depth {
            BitDepth::Int16 => {
                for sample in interleaved {
                    let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                    writer.write_sample(scaled).map_err(wav_error)?;
                }
            }
            BitDepth::Int24 => {
                for sample in interleaved {
                    // 24-bit stored as i32 in hound
                    let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                    writer.write_sample(scaled).map_err(wav_error)?;
                }
            }
            BitDepth::Float32 => {
                for sample in interleaved {
                    writer.write_sample(sample).map_err(wav_error)?;
                }
            }
        }
        writer.finalize().map_err(wav_error)?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decode::{Decoder, WavDecoder};
    use test_case::test_case;

    #[test_case(BitDepth::Int16, 2 ; "sixteen bit")]
    #[test_case(BitDepth::Int24, 3 ; "twenty four bit")]
    #[test_case(BitDepth::Float32, 4 ; "float")]
    fn test_data_length(bit_depth: BitDepth, bytes: usize) {
        let buffer = AudioBuffer::new(2, 1000, 44100);
        let wav = encode_wav(&buffer, bit_depth).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav.as_slice())).unwrap();
        assert_eq!(reader.spec().bits_per_sample as usize, bytes * 8);
        assert_eq!(reader.len() as usize, 2000);
        assert!(wav.len() >= WAV_HEADER_LEN + 2000 * bytes);
    }

    #[test]
    fn test_decoder_reads_back_levels() {
        let mut buffer = AudioBuffer::new(1, 100, 48000);
        buffer.samples[0].fill(0.5);
        let wav = encode_wav(&buffer, BitDepth::Int24).unwrap();
        let asset = WavDecoder.decode(&wav).unwrap();
        assert!((asset.channel(0)[50] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_bits_parse() {
        assert_eq!(BitDepth::from_bits(24).unwrap(), BitDepth::Int24);
        assert!(BitDepth::from_bits(12).is_err());
    }
}
