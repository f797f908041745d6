//! Decoding encoded audio into an [`AudioAsset`]
//!
//! Decoding is an external collaborator: the engine only needs something that
//! turns bytes into PCM. [`WavDecoder`] covers uncompressed WAV via `hound`;
//! hosts plug in their own implementation for compressed formats.

use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::engine::asset::AudioAsset;
use crate::engine::buffer::AudioBuffer;
use crate::error::{EngineError, Result};

/// Turns an encoded file into decoded PCM
pub trait Decoder {
    /// Decode a complete encoded file
    fn decode(&self, bytes: &[u8]) -> Result<AudioAsset>;
}

/// WAV decoder backed by `hound`
///
/// Accepts 8/16/24/32-bit integer and 32-bit float PCM with any channel count.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl WavDecoder {
    /// Read and decode a file from disk
    pub fn decode_file(&self, path: &Path) -> Result<AudioAsset> {
        let bytes = std::fs::read(path).map_err(|e| EngineError::Decode {
            reason: format!("failed to read {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        self.decode(&bytes)
    }
}

impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioAsset> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| EngineError::Decode {
            reason: format!("failed to open WAV data: {}", e),
            source: Some(Box::new(e)),
        })?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(EngineError::decode("WAV header declares zero channels"));
        }

        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        let buffer = AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)?;
        AudioAsset::new(buffer)
    }
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, 32) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(sample_error);
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (format, bits) => {
            return Err(EngineError::decode(format!(
                "unsupported sample format: {}-bit {:?}",
                bits, format
            )));
        }
    };

    // hound widens every integer depth into i32
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| (v as f64 / scale) as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(sample_error)
}

fn sample_error(e: hound::Error) -> EngineError {
    EngineError::Decode {
        reason: format!("failed to read samples: {}", e),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn wav_bytes(spec: WavSpec, samples: &[i32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_16bit_stereo() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[16384, -16384, 0, 32767]);

        let asset = WavDecoder.decode(&bytes).unwrap();
        assert_eq!(asset.num_channels(), 2);
        assert_eq!(asset.sample_rate(), 44100);
        assert_eq!(asset.num_frames(), 2);
        assert!((asset.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((asset.channel(1)[0] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_24bit() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[4194304, -8388608]);

        let asset = WavDecoder.decode(&bytes).unwrap();
        assert!((asset.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((asset.channel(0)[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let err = WavDecoder.decode(b"definitely not a wav file").unwrap_err();
        assert_eq!(err.error_code(), "DECODE_FAILURE");
    }

    #[test]
    fn test_header_without_samples_is_decode_failure() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[]);
        assert!(WavDecoder.decode(&bytes).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = WavDecoder
            .decode_file(Path::new("/nonexistent/path/audio.wav"))
            .unwrap_err();
        assert_eq!(err.error_code(), "DECODE_FAILURE");
    }
}
