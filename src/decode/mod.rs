//! Audio decoding into PCM samples.
//!
//! A blob is first handed to the probing decoder, which detects the container
//! and codec. Only when that fails and the blob declares an MPEG-audio type is
//! the restricted fallback decoder tried, exactly once.

mod codec;

pub use codec::{MpaFallbackDecoder, ProbeDecoder};

use crate::error::{Result, WavebarsError};
use std::path::Path;
use std::sync::Arc;

/// MIME types handled by the MPEG-audio fallback path.
const MP3_FAMILY: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/mpeg3",
    "audio/x-mpeg",
    "audio/x-mp3",
    "audio/x-mpeg-3",
];

/// A complete encoded audio buffer plus its declared media type.
///
/// The bytes are shared, so clones are cheap and the blob can be handed to
/// the blocking decode pool without copying.
#[derive(Debug, Clone)]
pub struct AudioBlob {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl AudioBlob {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Reads a file and derives the media type from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(bytes, mime_type_for_path(path)))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the declared media type belongs to the MP3 family.
    pub fn is_mp3_family(&self) -> bool {
        is_mp3_family(&self.mime_type)
    }

    /// File extension matching the declared media type, used as a probe hint.
    pub fn extension_hint(&self) -> Option<&'static str> {
        let essence = mime_essence(&self.mime_type);
        let ext = match essence.as_str() {
            "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => "wav",
            "audio/flac" | "audio/x-flac" => "flac",
            "audio/ogg" | "audio/opus" | "application/ogg" => "ogg",
            "audio/aac" | "audio/x-aac" => "aac",
            "audio/mp4" | "audio/x-m4a" | "audio/m4a" => "m4a",
            _ if is_mp3_family(&essence) => "mp3",
            _ => return None,
        };
        Some(ext)
    }
}

/// Lowercased media type without parameters (`audio/ogg; codecs=opus` -> `audio/ogg`).
fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether a media type string names an MPEG-audio (MP3) payload.
pub fn is_mp3_family(mime_type: &str) -> bool {
    let essence = mime_essence(mime_type);
    MP3_FAMILY.contains(&essence.as_str())
}

/// Maps a file extension to the media type the decoder expects.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" | "wave" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "aac" => "audio/aac",
        "m4a" | "mp4" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// PCM output of a decode: channel 0 only, plus stream metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// One way of turning encoded bytes into PCM.
pub trait DecodePath: Send + Sync {
    /// Short name used in logs and error reasons.
    fn name(&self) -> &'static str;

    fn decode(&self, blob: &AudioBlob) -> anyhow::Result<DecodedAudio>;
}

/// Decoder with a fixed primary-then-fallback order.
pub struct AudioDecoder<P = ProbeDecoder, F = MpaFallbackDecoder> {
    primary: P,
    fallback: F,
}

impl AudioDecoder {
    pub fn new() -> Self {
        Self::with_paths(ProbeDecoder, MpaFallbackDecoder)
    }
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: DecodePath, F: DecodePath> AudioDecoder<P, F> {
    pub fn with_paths(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    /// Decodes a blob to channel-0 PCM.
    ///
    /// # Errors
    /// - `EmptySource` for a zero-length blob
    /// - `DecodeFailed` when the primary path fails and the blob is not
    ///   MP3-family, or when both paths fail
    pub fn decode(&self, blob: &AudioBlob) -> Result<DecodedAudio> {
        if blob.is_empty() {
            return Err(WavebarsError::EmptySource);
        }

        let primary_err = match self.primary.decode(blob) {
            Ok(audio) => {
                tracing::debug!(
                    "Decoded {} bytes of {} via {}: {} samples at {}Hz",
                    blob.len(),
                    blob.mime_type(),
                    self.primary.name(),
                    audio.samples.len(),
                    audio.sample_rate
                );
                return Ok(audio);
            }
            Err(e) => e,
        };

        if !blob.is_mp3_family() {
            tracing::warn!(
                "{} decode failed for {} ({} bytes), no fallback for this type: {}",
                self.primary.name(),
                blob.mime_type(),
                blob.len(),
                primary_err
            );
            return Err(WavebarsError::decode_failed(
                blob.mime_type(),
                blob.len(),
                format!("{}: {primary_err}", self.primary.name()),
            ));
        }

        tracing::info!(
            "{} decode failed for {}, retrying with {}: {}",
            self.primary.name(),
            blob.mime_type(),
            self.fallback.name(),
            primary_err
        );

        self.fallback.decode(blob).map_err(|fallback_err| {
            tracing::warn!(
                "{} decode failed for {} ({} bytes): {}",
                self.fallback.name(),
                blob.mime_type(),
                blob.len(),
                fallback_err
            );
            WavebarsError::decode_failed(
                blob.mime_type(),
                blob.len(),
                format!(
                    "{}: {primary_err}; {}: {fallback_err}",
                    self.primary.name(),
                    self.fallback.name()
                ),
            )
        })
    }
}

impl<P, F> AudioDecoder<P, F>
where
    P: DecodePath + 'static,
    F: DecodePath + 'static,
{
    /// Runs [`AudioDecoder::decode`] on the blocking pool and awaits it.
    ///
    /// There is no cancellation: dropping the future leaves the decode running
    /// to completion and its result is discarded.
    pub async fn decode_async(self: Arc<Self>, blob: AudioBlob) -> Result<DecodedAudio> {
        let mime_type = blob.mime_type().to_string();
        let byte_len = blob.len();
        tokio::task::spawn_blocking(move || self.decode(&blob))
            .await
            .map_err(|e| WavebarsError::decode_failed(&mime_type, byte_len, format!("decode task failed: {e}")))?
    }
}
