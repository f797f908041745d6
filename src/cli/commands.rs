//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::{AudioAsset, WavDecoder};
use crate::export::{analyze_offline, ExportFormat, Exporter};
use crate::settings::EngineSettings;

/// Load the engine configuration, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Load a settings document, or the defaults when no file is given
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<EngineSettings> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read settings {}", path.display()))?;
            EngineSettings::from_json_str(&json)
                .with_context(|| format!("invalid settings in {}", path.display()))
        }
        None => Ok(EngineSettings::default()),
    }
}

fn load_asset(input: &Path) -> anyhow::Result<AudioAsset> {
    let asset = WavDecoder
        .decode_file(input)
        .with_context(|| format!("failed to decode {}", input.display()))?;
    info!(
        "Loaded {}: {} ch, {} Hz, {:.2}s",
        input.display(),
        asset.num_channels(),
        asset.sample_rate(),
        asset.duration_secs()
    );
    Ok(asset)
}

/// Master `input` and write the export to `output`.
pub fn render(
    input: &Path,
    output: &Path,
    settings: &EngineSettings,
    format: &ExportFormat,
    config: EngineConfig,
) -> anyhow::Result<()> {
    let asset = load_asset(input)?;
    let exporter = Exporter::with_pcm_transcoder(config);
    let exported = exporter.export(&asset, settings, format)?;

    if let Some(warning) = &exported.warning {
        warn!("{}", warning);
        println!("Warning: {}", warning);
    }

    std::fs::write(output, &exported.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Rendered {} ({}, {} Hz, {} ch, {} bytes)",
        output.display(),
        exported.media_type,
        exported.sample_rate,
        exported.channels,
        exported.bytes.len()
    );
    Ok(())
}

/// Print the loudness of the mastered render of `input`.
pub fn analyze(input: &Path, settings: &EngineSettings, config: &EngineConfig) -> anyhow::Result<()> {
    let asset = load_asset(input)?;
    let loudness = analyze_offline(&asset, settings, config)?;
    println!("{}", serde_json::to_string_pretty(&loudness)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{generate_test_tone, Decoder};
    use crate::export::{encode_wav, BitDepth};
    use tempfile::TempDir;

    fn write_tone(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("tone.wav");
        let tone = generate_test_tone(1000.0, 0.5, 0.5, 2, 44100);
        std::fs::write(&path, encode_wav(&tone, BitDepth::Int16).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_render_writes_wav() {
        let dir = TempDir::new().unwrap();
        let input = write_tone(&dir);
        let output = dir.path().join("master.wav");

        render(
            &input,
            &output,
            &EngineSettings::default(),
            &ExportFormat::default(),
            EngineConfig::default(),
        )
        .unwrap();

        let bytes = std::fs::read(&output).unwrap();
        let asset = WavDecoder.decode(&bytes).unwrap();
        assert_eq!(asset.sample_rate(), 44100);
        assert_eq!(asset.num_frames(), 22050);
    }

    #[test]
    fn test_settings_file_is_sanitized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "inputGain": 99, "limiter": { "enabled": false } }"#).unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.input_gain, 24.0);
        assert!(!settings.limiter.enabled);
    }

    #[test]
    fn test_missing_input_reports_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.wav");
        let err = analyze(&missing, &EngineSettings::default(), &EngineConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("missing.wav"));
    }
}
