//! Memoized peak extraction keyed by source identity.

use super::{extract, PeakSeries};
use crate::decode::{AudioBlob, AudioDecoder, DecodePath, DecodedAudio, MpaFallbackDecoder, ProbeDecoder};
use crate::error::{Result, WavebarsError};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;

/// Content identity of an audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey(u64);

impl SourceKey {
    pub fn of(blob: &AudioBlob) -> Self {
        let mut hasher = DefaultHasher::new();
        blob.mime_type().hash(&mut hasher);
        blob.bytes().hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Peaks for one source at one resolution, plus the clip duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePeaks {
    pub peaks: PeakSeries,
    pub duration_secs: f64,
}

type DecodeSlot = Arc<OnceCell<Arc<DecodedAudio>>>;

/// Decodes each distinct source once and serves peaks at any resolution
/// from the stored PCM.
///
/// The per-source cell doubles as the pending-decode token: concurrent
/// requests for the same source await a single decode. Failures are not
/// stored, so a later request retries. Peak series are memoized per
/// `(source, sample_count)` on top of the decoded audio.
pub struct PeakCache<P = ProbeDecoder, F = MpaFallbackDecoder> {
    decoder: Arc<AudioDecoder<P, F>>,
    decoded: Mutex<HashMap<SourceKey, DecodeSlot>>,
    peaks: Mutex<HashMap<(SourceKey, usize), Arc<SourcePeaks>>>,
}

impl PeakCache {
    pub fn new() -> Self {
        Self::with_decoder(AudioDecoder::new())
    }
}

impl Default for PeakCache {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<P, F> PeakCache<P, F>
where
    P: DecodePath + 'static,
    F: DecodePath + 'static,
{
    pub fn with_decoder(decoder: AudioDecoder<P, F>) -> Self {
        Self {
            decoder: Arc::new(decoder),
            decoded: Mutex::new(HashMap::new()),
            peaks: Mutex::new(HashMap::new()),
        }
    }

    async fn decoded(&self, key: SourceKey, blob: &AudioBlob) -> Result<Arc<DecodedAudio>> {
        let slot = Arc::clone(lock(&self.decoded).entry(key).or_default());
        let decoder = Arc::clone(&self.decoder);
        let blob = blob.clone();
        let audio = slot
            .get_or_try_init(|| async move {
                let audio = decoder.decode_async(blob).await?;
                tracing::debug!("Decoded {:.2}s of audio", audio.duration_secs());
                Ok::<_, WavebarsError>(Arc::new(audio))
            })
            .await?;
        Ok(Arc::clone(audio))
    }

    /// Returns cached peaks, decoding the source on its first request.
    ///
    /// # Errors
    /// Propagates `EmptySource` and `DecodeFailed` from the decoder.
    pub async fn get_or_compute(&self, blob: &AudioBlob, sample_count: usize) -> Result<Arc<SourcePeaks>> {
        let source = SourceKey::of(blob);
        if let Some(peaks) = lock(&self.peaks).get(&(source, sample_count)) {
            return Ok(Arc::clone(peaks));
        }

        let audio = self.decoded(source, blob).await?;
        let computed = Arc::new(SourcePeaks {
            peaks: extract(&audio.samples, sample_count),
            duration_secs: audio.duration_secs(),
        });
        tracing::debug!("Extracted {} peaks", computed.peaks.len());

        let mut peaks = lock(&self.peaks);
        let stored = peaks.entry((source, sample_count)).or_insert(computed);
        Ok(Arc::clone(stored))
    }

    /// Returns peaks only if they were already computed.
    pub fn get(&self, blob: &AudioBlob, sample_count: usize) -> Option<Arc<SourcePeaks>> {
        let key = (SourceKey::of(blob), sample_count);
        lock(&self.peaks).get(&key).cloned()
    }

    /// Drops a source's decoded audio and every peak resolution computed from it.
    /// Returns the number of peak series removed.
    pub fn evict(&self, key: SourceKey) -> usize {
        lock(&self.decoded).remove(&key);
        let mut peaks = lock(&self.peaks);
        let before = peaks.len();
        peaks.retain(|(source, _), _| *source != key);
        before - peaks.len()
    }

    /// Number of cached `(source, sample_count)` peak series.
    pub fn len(&self) -> usize {
        lock(&self.peaks).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.peaks).is_empty()
    }

    /// Number of sources whose audio is decoded and held.
    pub fn decoded_sources(&self) -> usize {
        lock(&self.decoded).values().filter(|slot| slot.initialized()).count()
    }
}
