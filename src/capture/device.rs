//! Capture capability seams.
//!
//! The session only talks to hardware through these traits, so the state
//! machine can be driven by the cpal backend or by an in-memory fake.

use crate::error::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default number of recent samples retained for analysis (largest FFT size).
pub const DEFAULT_SIGNAL_CAPACITY: usize = 32_768;

/// Bounded window of the most recent mono samples from a live stream.
///
/// Written by the capture callback, read by the analyser bridge.
#[derive(Debug, Clone)]
pub struct LiveSignal {
    inner: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl LiveSignal {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<f32>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends samples, evicting the oldest beyond capacity.
    pub fn push_samples(&self, samples: &[f32]) {
        let mut ring = self.lock();
        let skip = samples.len().saturating_sub(self.capacity);
        for &s in &samples[skip..] {
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(s);
        }
    }

    /// Copies the newest `out.len()` samples into `out`, oldest first.
    ///
    /// When fewer samples are available the front of `out` is zero-filled.
    /// Returns the number of real samples copied.
    pub fn copy_latest(&self, out: &mut [f32]) -> usize {
        let ring = self.lock();
        let available = ring.len().min(out.len());
        let pad = out.len() - available;
        out[..pad].fill(0.0);
        for (dst, &src) in out[pad..].iter_mut().zip(ring.iter().skip(ring.len() - available)) {
            *dst = src;
        }
        available
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Whether two handles share the same underlying window.
    pub fn same_as(&self, other: &LiveSignal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for LiveSignal {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAPACITY)
    }
}

/// A microphone (or stand-in) that can be opened for recording.
pub trait CaptureDevice {
    type Stream: CaptureStream;

    /// Container type of the blob this device produces, if it reports one.
    fn supported_mime_type(&self) -> Option<String>;

    /// Requests access and starts capturing into `signal`.
    ///
    /// # Errors
    /// - `PermissionDenied` if access is refused
    /// - `DeviceUnavailable` if no usable device exists
    fn open(&mut self, signal: LiveSignal) -> Result<Self::Stream>;
}

/// A running capture: recorder controls plus ordered chunk delivery.
pub trait CaptureStream {
    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Moves chunks delivered since the last call into `out`, in delivery order.
    fn drain_chunks(&mut self, out: &mut Vec<Vec<u8>>);

    /// Takes a hardware or encoding fault raised since the last call.
    fn take_fault(&mut self) -> Option<String>;

    /// Wraps the concatenated chunk payload into the final container.
    fn finalize(&mut self, payload: Vec<u8>) -> Result<Vec<u8>>;

    /// Releases the hardware stream. Called at most once by the session.
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_keeps_newest_samples() {
        let signal = LiveSignal::new(4);
        signal.push_samples(&[1.0, 2.0, 3.0]);
        signal.push_samples(&[4.0, 5.0, 6.0]);
        assert_eq!(signal.len(), 4);

        let mut out = [0.0; 4];
        assert_eq!(signal.copy_latest(&mut out), 4);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_signal_zero_pads_short_history() {
        let signal = LiveSignal::new(8);
        signal.push_samples(&[0.5, 0.25]);

        let mut out = [9.0; 4];
        assert_eq!(signal.copy_latest(&mut out), 2);
        assert_eq!(out, [0.0, 0.0, 0.5, 0.25]);
    }

    #[test]
    fn test_oversized_push_keeps_tail() {
        let signal = LiveSignal::new(2);
        signal.push_samples(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut out = [0.0; 2];
        signal.copy_latest(&mut out);
        assert_eq!(out, [4.0, 5.0]);
        assert!(signal.same_as(&signal.clone()));
        assert!(!signal.same_as(&LiveSignal::new(2)));
    }
}
