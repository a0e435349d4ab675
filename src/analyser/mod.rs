//! Time- and frequency-domain analysis of a live capture.
//!
//! The bridge follows a capture session: it attaches to the session's live
//! signal the first time it is seen recording, and lets go of every analysis
//! buffer once the session stops, faults, or goes away.

use crate::capture::{CaptureDevice, CaptureSession, LiveSignal, SessionId, SessionState};
use crate::error::{Result, WavebarsError};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;

/// Decibel window mapped onto the 0-255 frequency byte range.
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserOptions {
    /// Samples per analysis frame; a power of two.
    pub fft_size: usize,
    /// Weight of the previous frame in the frequency average, in `[0, 1]`.
    pub smoothing: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
        }
    }
}

impl AnalyserOptions {
    /// # Errors
    /// `InvalidConfig` for a non-power-of-two or out-of-range FFT size, or a
    /// smoothing factor outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size) {
            return Err(WavebarsError::InvalidConfig(format!(
                "fft_size must be a power of two between {MIN_FFT_SIZE} and {MAX_FFT_SIZE}, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(WavebarsError::InvalidConfig(format!(
                "smoothing must be within [0, 1], got {}",
                self.smoothing
            )));
        }
        Ok(())
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// Anything that can hand out a fresh byte-domain time signal.
///
/// Bytes are centred on 128, so silence reads as a buffer of 128s.
pub trait TimeDomainSource {
    fn read_time_domain(&mut self) -> Option<&[u8]>;
}

/// Buffers held for one attached session.
struct Attachment {
    session: SessionId,
    signal: LiveSignal,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    time_bytes: Vec<u8>,
    freq_bytes: Vec<u8>,
}

pub struct AnalyserBridge {
    options: AnalyserOptions,
    planner: FftPlanner<f32>,
    attachment: Option<Attachment>,
}

impl AnalyserBridge {
    /// # Errors
    /// `InvalidConfig` if `options` fail validation.
    pub fn new(options: AnalyserOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            planner: FftPlanner::new(),
            attachment: None,
        })
    }

    pub fn options(&self) -> AnalyserOptions {
        self.options
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn attached_session(&self) -> Option<SessionId> {
        self.attachment.as_ref().map(|a| a.session)
    }

    /// Follows `session` through its lifecycle.
    ///
    /// Call once per frame or tick. Attaches on the first active state,
    /// re-attaches when handed a different session, detaches when the session
    /// is gone, stopped or faulted.
    pub fn sync<D: CaptureDevice>(&mut self, session: Option<&CaptureSession<D>>) {
        let Some(session) = session else {
            self.detach();
            return;
        };

        match session.state() {
            SessionState::Recording | SessionState::Paused => {
                if let Some(signal) = session.live_signal() {
                    self.attach(session.id(), signal.clone());
                }
            }
            SessionState::Stopped | SessionState::Faulted => self.detach(),
            SessionState::Idle => {
                if self.attached_session().is_some_and(|id| id != session.id()) {
                    self.detach();
                }
            }
        }
    }

    /// Attaches to a live signal. Returns `false` if already attached to `session`.
    pub fn attach(&mut self, session: SessionId, signal: LiveSignal) -> bool {
        if self.attached_session() == Some(session) {
            return false;
        }
        self.detach();

        let n = self.options.fft_size;
        let fft = self.planner.plan_fft_forward(n);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        self.attachment = Some(Attachment {
            session,
            signal,
            fft,
            window: blackman_window(n),
            samples: vec![0.0; n],
            spectrum: vec![Complex::default(); n],
            scratch,
            smoothed: vec![0.0; n / 2],
            time_bytes: vec![128; n],
            freq_bytes: vec![0; n / 2],
        });
        tracing::debug!("Analyser attached to session {} (fft_size {})", session, n);
        true
    }

    /// Releases all analysis buffers. Safe to call repeatedly.
    pub fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            tracing::debug!("Analyser detached from session {}", attachment.session);
        }
    }

    /// Pulls the newest samples and recomputes the time-domain bytes.
    pub fn refresh_time_domain(&mut self) -> Option<&[u8]> {
        let a = self.attachment.as_mut()?;
        a.signal.copy_latest(&mut a.samples);
        for (byte, &s) in a.time_bytes.iter_mut().zip(&a.samples) {
            *byte = (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8;
        }
        Some(a.time_bytes.as_slice())
    }

    /// Pulls the newest samples and recomputes the smoothed spectrum bytes.
    pub fn refresh_frequency(&mut self) -> Option<&[u8]> {
        let smoothing = self.options.smoothing;
        let a = self.attachment.as_mut()?;
        a.signal.copy_latest(&mut a.samples);

        for ((c, &s), &w) in a.spectrum.iter_mut().zip(&a.samples).zip(&a.window) {
            *c = Complex::new(s * w, 0.0);
        }
        a.fft.process_with_scratch(&mut a.spectrum, &mut a.scratch);

        let n = a.samples.len() as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for ((avg, byte), bin) in a.smoothed.iter_mut().zip(a.freq_bytes.iter_mut()).zip(&a.spectrum) {
            let magnitude = bin.norm() / n;
            *avg = smoothing * *avg + (1.0 - smoothing) * magnitude;
            let db = if *avg > 0.0 { 20.0 * avg.log10() } else { f32::NEG_INFINITY };
            *byte = (255.0 / range * (db - MIN_DECIBELS)).clamp(0.0, 255.0) as u8;
        }
        Some(a.freq_bytes.as_slice())
    }

    /// Last computed time-domain bytes, without refreshing.
    pub fn time_domain_bytes(&self) -> Option<&[u8]> {
        self.attachment.as_ref().map(|a| a.time_bytes.as_slice())
    }

    /// Last computed frequency bytes, without refreshing.
    pub fn frequency_bytes(&self) -> Option<&[u8]> {
        self.attachment.as_ref().map(|a| a.freq_bytes.as_slice())
    }
}

impl TimeDomainSource for AnalyserBridge {
    fn read_time_domain(&mut self) -> Option<&[u8]> {
        self.refresh_time_domain()
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    (0..n)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::FakeDevice;
    use std::time::Instant;

    fn bridge(fft_size: usize) -> AnalyserBridge {
        AnalyserBridge::new(AnalyserOptions {
            fft_size,
            smoothing: 0.0,
        })
        .unwrap()
    }

    #[test]
    fn test_options_validation() {
        assert!(AnalyserOptions::default().validate().is_ok());
        for fft_size in [0, 16, 1000, 65_536] {
            let options = AnalyserOptions { fft_size, smoothing: 0.8 };
            assert!(matches!(options.validate(), Err(WavebarsError::InvalidConfig(_))));
        }
        let options = AnalyserOptions { fft_size: 2048, smoothing: 1.5 };
        assert!(options.validate().is_err());
        let options = AnalyserOptions { fft_size: 2048, smoothing: f32::NAN };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_follows_session_lifecycle() {
        let device = FakeDevice::default();
        let mut session = CaptureSession::new(device.clone());
        let mut bridge = bridge(64);
        let t0 = Instant::now();

        bridge.sync(Some(&session));
        assert!(!bridge.is_attached());

        session.start(t0).unwrap();
        bridge.sync(Some(&session));
        assert_eq!(bridge.attached_session(), Some(session.id()));

        // Same session again must keep the existing buffers.
        assert!(!bridge.attach(session.id(), LiveSignal::new(64)));

        session.pause(t0);
        bridge.sync(Some(&session));
        assert!(bridge.is_attached());

        session.stop(t0);
        bridge.sync(Some(&session));
        assert!(!bridge.is_attached());
        assert!(bridge.time_domain_bytes().is_none());
    }

    #[test]
    fn test_detaches_when_session_dropped() {
        let mut session = CaptureSession::new(FakeDevice::default());
        session.start(Instant::now()).unwrap();
        let mut bridge = bridge(64);
        bridge.sync(Some(&session));
        assert!(bridge.is_attached());

        bridge.sync::<FakeDevice>(None);
        assert!(!bridge.is_attached());
        bridge.detach();
    }

    #[test]
    fn test_time_domain_bytes_centre_on_128() {
        let signal = LiveSignal::new(64);
        let mut bridge = bridge(32);
        bridge.attach(SessionId::for_test(1), signal.clone());

        assert!(bridge.refresh_time_domain().unwrap().iter().all(|&b| b == 128));

        signal.push_samples(&[1.0, -1.0, 0.5]);
        let bytes = bridge.refresh_time_domain().unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[29..], &[255, 0, 192]);
    }

    #[test]
    fn test_frequency_peak_lands_in_tone_bin() {
        let n = 256;
        let signal = LiveSignal::new(n);
        let tone: Vec<f32> = (0..n)
            .map(|i| 0.001 * (2.0 * std::f32::consts::PI * 16.0 * i as f32 / n as f32).sin())
            .collect();
        signal.push_samples(&tone);

        let mut bridge = bridge(n);
        bridge.attach(SessionId::for_test(2), signal);
        let bins = bridge.refresh_frequency().unwrap();

        assert_eq!(bins.len(), n / 2);
        let loudest = bins.iter().enumerate().max_by_key(|&(_, b)| *b).map(|(i, _)| i);
        assert_eq!(loudest, Some(16));
        assert!(bins[15] < bins[16] && bins[17] < bins[16]);
        assert_eq!(bins[60], 0);
    }

    #[test]
    fn test_smoothing_decays_spectrum() {
        let n = 64;
        let signal = LiveSignal::new(n);
        let mut bridge = AnalyserBridge::new(AnalyserOptions { fft_size: n, smoothing: 0.9 }).unwrap();
        bridge.attach(SessionId::for_test(3), signal.clone());

        signal.push_samples(&vec![0.8; n]);
        let loud = bridge.refresh_frequency().unwrap()[0];
        signal.push_samples(&vec![0.0; n]);
        let after = bridge.refresh_frequency().unwrap()[0];

        // Silence is averaged in rather than dropping straight to zero.
        assert!(loud > 0);
        assert!(after > 0 && after <= loud);
    }

    #[test]
    fn test_blackman_window_endpoints() {
        let w = blackman_window(8);
        assert!(w[0].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-5);
    }
}
