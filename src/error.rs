//! Error handling for the mastering engine
//!
//! Every failure surfaced to callers carries a human-readable message,
//! a stable error code and recovery suggestions.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    // Lifecycle Errors
    #[error("Audio subsystem unavailable: {reason}")]
    Initialization { reason: String },

    #[error("Invalid configuration: {field} = {value} (expected {expected})")]
    InvalidConfig {
        field: String,
        value: String,
        expected: String,
    },

    // Input Errors
    #[error("Could not decode audio: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cannot {operation}: no audio loaded")]
    NotLoaded { operation: String },

    // Output Errors
    #[error("Offline render failed: {reason}")]
    Render { reason: String },

    #[error("Transcoder unavailable for {target}: {reason}")]
    TranscodeUnavailable { target: String, reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Shorthand for a decode failure without an underlying source error
    pub fn decode(reason: impl Into<String>) -> Self {
        EngineError::Decode {
            reason: reason.into(),
            source: None,
        }
    }

    /// Shorthand for a transport operation attempted before any load
    pub fn not_loaded(operation: impl Into<String>) -> Self {
        EngineError::NotLoaded {
            operation: operation.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Initialization { .. } => "INITIALIZATION_FAILURE",
            EngineError::InvalidConfig { .. } => "INVALID_CONFIG",
            EngineError::Decode { .. } => "DECODE_FAILURE",
            EngineError::NotLoaded { .. } => "NOT_LOADED",
            EngineError::Render { .. } => "RENDER_FAILURE",
            EngineError::TranscodeUnavailable { .. } => "TRANSCODE_UNAVAILABLE",
            EngineError::Io(_) => "IO_ERROR",
            EngineError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the engine recovers from this error on its own
    ///
    /// Only a missing or failing transcoder is recovered automatically, by
    /// falling back to uncompressed output.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::TranscodeUnavailable { .. })
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            EngineError::Initialization { .. } => vec![
                "Check that an audio output device is available",
                "Use a supported sample rate (8 kHz to 384 kHz)",
            ],
            EngineError::InvalidConfig { .. } => vec![
                "Fix the offending field in the engine configuration",
                "Remove the field to fall back to its default",
            ],
            EngineError::Decode { .. } => vec![
                "Try converting the file to WAV format first",
                "Check if the file plays in another application",
                "The file may be corrupted - try re-exporting from source",
            ],
            EngineError::NotLoaded { .. } => vec!["Load an audio file before using the transport"],
            EngineError::Render { .. } => vec![
                "The processing settings may be too extreme",
                "Try exporting at the source sample rate",
            ],
            EngineError::TranscodeUnavailable { .. } => vec![
                "The file was exported as uncompressed WAV instead",
                "Convert the WAV with an external encoder",
            ],
            _ => vec![],
        }
    }

    /// Get a user-friendly message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            EngineError::Decode { reason, .. } => {
                format!("This file doesn't appear to be playable audio: {}.", reason)
            }
            EngineError::NotLoaded { operation } => {
                format!("Load a track first, then {}.", operation)
            }
            EngineError::TranscodeUnavailable { target, .. } => {
                format!(
                    "{} export isn't available right now, so you got a WAV file instead.",
                    target
                )
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = EngineError::decode("truncated header");
        assert_eq!(err.error_code(), "DECODE_FAILURE");

        let err = EngineError::not_loaded("play");
        assert_eq!(err.error_code(), "NOT_LOADED");
        assert_eq!(err.to_string(), "Cannot play: no audio loaded");
    }

    #[test]
    fn test_only_transcode_is_recoverable() {
        let err = EngineError::TranscodeUnavailable {
            target: "mp3".to_string(),
            reason: "no encoder".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(!err.recovery_suggestions().is_empty());

        let err = EngineError::Render {
            reason: "empty output".to_string(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_friendly_message_mentions_fallback() {
        let err = EngineError::TranscodeUnavailable {
            target: "FLAC".to_string(),
            reason: "missing".to_string(),
        };
        assert!(err.friendly_message().contains("WAV"));
    }
}
