//! Error taxonomy for the waveform pipeline.
//!
//! Decode and extraction errors are returned to the caller of the rendering
//! path. Capture errors are additionally recorded on the session so a
//! long-running recording loop can observe them without a single call site.

use thiserror::Error;

/// Errors produced by the decode, capture and rendering pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WavebarsError {
    /// Zero-length input handed to the decoder.
    #[error("Audio source is empty")]
    EmptySource,

    /// Every applicable decode path failed.
    #[error("Failed to decode {byte_len} bytes of '{mime_type}': {reason}")]
    DecodeFailed {
        mime_type: String,
        byte_len: usize,
        reason: String,
    },

    /// Microphone access was refused by the user or platform.
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No usable capture device, or the device rejected its configuration.
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Hardware or encoding error while a recording was in progress.
    #[error("Recorder fault: {0}")]
    RecorderFault(String),

    /// A construction parameter was out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WavebarsError {
    /// Builds a `DecodeFailed` with the diagnostics every decode failure carries.
    pub fn decode_failed(mime_type: &str, byte_len: usize, reason: impl Into<String>) -> Self {
        Self::DecodeFailed {
            mime_type: mime_type.to_string(),
            byte_len,
            reason: reason.into(),
        }
    }

    /// Whether this error came from starting a capture session.
    ///
    /// Start failures leave the session idle, so `start()` may be retried.
    pub fn is_retryable_start_failure(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::DeviceUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, WavebarsError>;
