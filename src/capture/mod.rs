//! Recording lifecycle for one capture attempt.
//!
//! `idle -> recording -> (paused <-> recording) -> stopped`, with `faulted` as
//! the terminal state for mid-recording hardware or encoding errors. Errors are
//! reported through [`CaptureSession::error`] and the error callback, since the
//! recording loop outlives any single call site.

pub mod cpal_device;
pub mod device;

pub use cpal_device::{list_input_devices, CpalCaptureDevice, CpalCaptureStream, InputDeviceInfo};
pub use device::{CaptureDevice, CaptureStream, LiveSignal, DEFAULT_SIGNAL_CAPACITY};

use crate::decode::AudioBlob;
use crate::error::{Result, WavebarsError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Fallback container when the device does not report one.
const DEFAULT_MIME_TYPE: &str = "audio/wav";

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn for_test(raw: u64) -> Self {
        Self(u64::MAX - raw)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
    Stopped,
    Faulted,
}

impl SessionState {
    /// Whether the session holds a live hardware stream.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Faulted)
    }
}

/// The identity/state pair other components key their behaviour on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionBinding {
    pub id: SessionId,
    pub state: SessionState,
}

/// Counts whole seconds of active (unpaused) recording time.
#[derive(Debug, Default)]
struct DurationTicker {
    seconds: u64,
    carry: Duration,
    running_since: Option<Instant>,
}

impl DurationTicker {
    fn run(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    fn halt(&mut self, now: Instant) {
        self.advance(now);
        self.running_since = None;
    }

    fn advance(&mut self, now: Instant) {
        let Some(since) = self.running_since else {
            return;
        };
        self.carry += now.saturating_duration_since(since);
        self.running_since = Some(now);
        while self.carry >= Duration::from_secs(1) {
            self.carry -= Duration::from_secs(1);
            self.seconds += 1;
        }
    }
}

type CompleteCallback = Box<dyn FnMut(&AudioBlob)>;
type ErrorCallback = Box<dyn FnMut(&WavebarsError)>;

/// One recording attempt against a capture device.
pub struct CaptureSession<D: CaptureDevice> {
    id: SessionId,
    device: D,
    stream: Option<D::Stream>,
    state: SessionState,
    signal: LiveSignal,
    mime_type: String,
    chunks: Vec<Vec<u8>>,
    blob: Option<AudioBlob>,
    error: Option<WavebarsError>,
    ticker: DurationTicker,
    on_complete: Option<CompleteCallback>,
    on_error: Option<ErrorCallback>,
}

impl<D: CaptureDevice> CaptureSession<D> {
    pub fn new(device: D) -> Self {
        Self::with_signal(device, LiveSignal::default())
    }

    /// Creates a session whose live samples land in `signal`.
    pub fn with_signal(device: D, signal: LiveSignal) -> Self {
        let mime_type = device
            .supported_mime_type()
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        Self {
            id: SessionId::next(),
            device,
            stream: None,
            state: SessionState::Idle,
            signal,
            mime_type,
            chunks: Vec::new(),
            blob: None,
            error: None,
            ticker: DurationTicker::default(),
            on_complete: None,
            on_error: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn binding(&self) -> SessionBinding {
        SessionBinding {
            id: self.id,
            state: self.state,
        }
    }

    /// Seconds of recording so far, excluding paused time.
    pub fn elapsed_secs(&self) -> u64 {
        self.ticker.seconds
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Live sample window, available while the hardware stream is held.
    pub fn live_signal(&self) -> Option<&LiveSignal> {
        self.stream.as_ref().map(|_| &self.signal)
    }

    /// Final blob, set only once the session has stopped.
    pub fn blob(&self) -> Option<&AudioBlob> {
        self.blob.as_ref()
    }

    /// Most recent start failure or fault.
    pub fn error(&self) -> Option<&WavebarsError> {
        self.error.as_ref()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Number of chunks collected so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Registers the callback that receives the final blob, exactly once.
    pub fn on_complete(&mut self, callback: impl FnMut(&AudioBlob) + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Registers the callback for start failures and faults.
    pub fn on_error(&mut self, callback: impl FnMut(&WavebarsError) + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    fn report(&mut self, err: WavebarsError) {
        if let Some(callback) = self.on_error.as_mut() {
            callback(&err);
        }
        self.error = Some(err);
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            self.signal.clear();
            tracing::debug!("Session {} released capture stream", self.id);
        }
    }

    /// Acquires the microphone and begins recording.
    ///
    /// Only valid from `idle`; other states are a no-op.
    ///
    /// # Errors
    /// `PermissionDenied` or `DeviceUnavailable`. The session stays `idle`
    /// and `start` may be called again.
    pub fn start(&mut self, now: Instant) -> Result<()> {
        if self.state != SessionState::Idle {
            tracing::debug!("Session {} start ignored in state {:?}", self.id, self.state);
            return Ok(());
        }

        match self.device.open(self.signal.clone()) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.error = None;
                self.state = SessionState::Recording;
                self.ticker.run(now);
                tracing::info!("Session {} recording ({})", self.id, self.mime_type);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Session {} failed to start: {}", self.id, err);
                self.report(err.clone());
                Err(err)
            }
        }
    }

    /// Pauses capture; a no-op unless recording.
    pub fn pause(&mut self, now: Instant) {
        if self.state != SessionState::Recording {
            return;
        }
        let result = match self.stream.as_mut() {
            Some(stream) => stream.pause(),
            None => Ok(()),
        };
        if let Err(err) = result {
            self.fault(err);
            return;
        }
        self.ticker.halt(now);
        self.state = SessionState::Paused;
        tracing::debug!("Session {} paused at {}s", self.id, self.ticker.seconds);
    }

    /// Resumes capture; a no-op unless paused.
    pub fn resume(&mut self, now: Instant) {
        if self.state != SessionState::Paused {
            return;
        }
        let result = match self.stream.as_mut() {
            Some(stream) => stream.resume(),
            None => Ok(()),
        };
        if let Err(err) = result {
            self.fault(err);
            return;
        }
        self.ticker.run(now);
        self.state = SessionState::Recording;
        tracing::debug!("Session {} resumed", self.id);
    }

    pub fn toggle_pause(&mut self, now: Instant) {
        match self.state {
            SessionState::Recording => self.pause(now),
            SessionState::Paused => self.resume(now),
            _ => {}
        }
    }

    /// Collects delivered chunks, checks for faults and advances the duration.
    pub fn poll(&mut self, now: Instant) {
        if !self.state.is_active() {
            return;
        }

        let fault = match self.stream.as_mut() {
            Some(stream) => {
                stream.drain_chunks(&mut self.chunks);
                stream.take_fault()
            }
            None => None,
        };
        if let Some(reason) = fault {
            self.fault(WavebarsError::RecorderFault(reason));
            return;
        }

        if self.state == SessionState::Recording {
            self.ticker.advance(now);
        }
    }

    /// Finalizes the chunks into one blob and releases the stream.
    ///
    /// The completion callback fires exactly once; later calls, and calls
    /// from `idle`, are no-ops.
    pub fn stop(&mut self, now: Instant) {
        if !self.state.is_active() {
            return;
        }
        self.ticker.halt(now);

        let finalized = match self.stream.as_mut() {
            Some(stream) => {
                stream.drain_chunks(&mut self.chunks);
                match stream.take_fault() {
                    Some(reason) => Err(WavebarsError::RecorderFault(reason)),
                    None => stream.finalize(self.chunks.concat()),
                }
            }
            None => Ok(self.chunks.concat()),
        };

        match finalized {
            Ok(bytes) => {
                self.release_stream();
                self.chunks.clear();
                self.state = SessionState::Stopped;
                let blob = AudioBlob::new(bytes, self.mime_type.clone());
                tracing::info!(
                    "Session {} stopped: {}s, {} bytes",
                    self.id,
                    self.ticker.seconds,
                    blob.len()
                );
                if let Some(callback) = self.on_complete.as_mut() {
                    callback(&blob);
                }
                self.blob = Some(blob);
            }
            Err(err) => self.fault(err),
        }
    }

    /// Moves to `faulted`, discarding partial audio and releasing hardware.
    fn fault(&mut self, err: WavebarsError) {
        tracing::error!("Session {} fault: {}", self.id, err);
        self.chunks.clear();
        self.release_stream();
        self.state = SessionState::Faulted;
        self.report(err);
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.release_stream();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory capture device shared by tests across the crate.

    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub struct FakeHardware {
        pub opened: usize,
        pub released: usize,
        pub pauses: usize,
        pub resumes: usize,
        pub pending_chunks: Vec<Vec<u8>>,
        pub fault: Option<String>,
        pub open_error: Option<WavebarsError>,
        pub signal: Option<LiveSignal>,
    }

    #[derive(Clone, Default)]
    pub struct FakeDevice {
        pub hw: Rc<RefCell<FakeHardware>>,
    }

    pub struct FakeStream {
        hw: Rc<RefCell<FakeHardware>>,
    }

    impl FakeDevice {
        pub fn deliver(&self, chunk: &[u8]) {
            self.hw.borrow_mut().pending_chunks.push(chunk.to_vec());
        }

        pub fn feed(&self, samples: &[f32]) {
            if let Some(signal) = self.hw.borrow().signal.as_ref() {
                signal.push_samples(samples);
            }
        }
    }

    impl CaptureDevice for FakeDevice {
        type Stream = FakeStream;

        fn supported_mime_type(&self) -> Option<String> {
            Some("audio/x-fake".to_string())
        }

        fn open(&mut self, signal: LiveSignal) -> Result<FakeStream> {
            let mut hw = self.hw.borrow_mut();
            if let Some(err) = hw.open_error.take() {
                return Err(err);
            }
            hw.opened += 1;
            hw.signal = Some(signal);
            Ok(FakeStream { hw: Rc::clone(&self.hw) })
        }
    }

    impl CaptureStream for FakeStream {
        fn pause(&mut self) -> Result<()> {
            self.hw.borrow_mut().pauses += 1;
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            self.hw.borrow_mut().resumes += 1;
            Ok(())
        }

        fn drain_chunks(&mut self, out: &mut Vec<Vec<u8>>) {
            out.append(&mut self.hw.borrow_mut().pending_chunks);
        }

        fn take_fault(&mut self) -> Option<String> {
            self.hw.borrow_mut().fault.take()
        }

        fn finalize(&mut self, payload: Vec<u8>) -> Result<Vec<u8>> {
            Ok(payload)
        }

        fn release(&mut self) {
            self.hw.borrow_mut().released += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeDevice;
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn secs(base: Instant, s: f64) -> Instant {
        base + Duration::from_secs_f64(s)
    }

    #[test]
    fn test_full_lifecycle_concatenates_chunks_in_order() {
        let device = FakeDevice::default();
        let mut session = CaptureSession::new(device.clone());
        let t0 = Instant::now();

        assert_eq!(session.state(), SessionState::Idle);
        session.start(t0).unwrap();
        assert_eq!(session.state(), SessionState::Recording);
        assert!(session.live_signal().is_some());

        device.deliver(b"ab");
        session.poll(secs(t0, 0.5));
        device.deliver(b"cd");
        session.pause(secs(t0, 1.0));
        device.deliver(b"ef");
        session.resume(secs(t0, 5.0));
        session.poll(secs(t0, 6.0));
        session.stop(secs(t0, 6.5));

        assert_eq!(session.state(), SessionState::Stopped);
        let blob = session.blob().unwrap();
        assert_eq!(blob.bytes(), b"abcdef");
        assert_eq!(blob.mime_type(), "audio/x-fake");
        assert_eq!(device.hw.borrow().released, 1);
        assert!(session.live_signal().is_none());
    }

    #[test]
    fn test_duration_excludes_paused_time() {
        let mut session = CaptureSession::new(FakeDevice::default());
        let t0 = Instant::now();
        session.start(t0).unwrap();

        session.poll(secs(t0, 2.5));
        assert_eq!(session.elapsed_secs(), 2);

        session.pause(secs(t0, 3.0));
        session.poll(secs(t0, 60.0));
        assert_eq!(session.elapsed_secs(), 3);

        session.resume(secs(t0, 60.0));
        session.poll(secs(t0, 61.9));
        assert_eq!(session.elapsed_secs(), 4);
    }

    #[test]
    fn test_stop_twice_completes_once() {
        let device = FakeDevice::default();
        let mut session = CaptureSession::new(device.clone());
        let completions = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&completions);
        session.on_complete(move |_| *counter.borrow_mut() += 1);

        let t0 = Instant::now();
        session.start(t0).unwrap();
        session.stop(secs(t0, 1.0));
        session.stop(secs(t0, 2.0));

        assert_eq!(*completions.borrow(), 1);
        assert_eq!(device.hw.borrow().released, 1);
    }

    #[test]
    fn test_stop_from_idle_is_noop() {
        let mut session = CaptureSession::new(FakeDevice::default());
        session.stop(Instant::now());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.blob().is_none());
    }

    #[test]
    fn test_start_failure_leaves_idle_and_can_retry() {
        let device = FakeDevice::default();
        device.hw.borrow_mut().open_error = Some(WavebarsError::PermissionDenied("denied".into()));
        let mut session = CaptureSession::new(device.clone());
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        session.on_error(move |e| sink.borrow_mut().push(e.clone()));

        let err = session.start(Instant::now()).unwrap_err();
        assert!(matches!(err, WavebarsError::PermissionDenied(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(errors.borrow().len(), 1);
        assert!(session.error().is_some());

        session.start(Instant::now()).unwrap();
        assert_eq!(session.state(), SessionState::Recording);
        assert!(session.error().is_none());
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let device = FakeDevice::default();
        let mut session = CaptureSession::new(device.clone());
        let t0 = Instant::now();

        session.resume(t0);
        assert_eq!(session.state(), SessionState::Idle);

        session.start(t0).unwrap();
        session.resume(t0);
        session.pause(t0);
        session.pause(t0);
        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(device.hw.borrow().pauses, 1);
        assert_eq!(device.hw.borrow().resumes, 0);
    }

    #[test]
    fn test_fault_discards_chunks_and_skips_completion() {
        let device = FakeDevice::default();
        let mut session = CaptureSession::new(device.clone());
        let completed = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&completed);
        session.on_complete(move |_| *flag.borrow_mut() = true);

        let t0 = Instant::now();
        session.start(t0).unwrap();
        device.deliver(b"partial");
        session.poll(t0);
        assert_eq!(session.chunk_count(), 1);

        device.hw.borrow_mut().fault = Some("buffer overrun".into());
        session.poll(secs(t0, 0.1));

        assert_eq!(session.state(), SessionState::Faulted);
        assert_eq!(session.chunk_count(), 0);
        assert!(matches!(session.error(), Some(WavebarsError::RecorderFault(_))));
        assert_eq!(device.hw.borrow().released, 1);

        session.stop(secs(t0, 0.2));
        assert!(!*completed.borrow());
        assert!(session.blob().is_none());
    }

    #[test]
    fn test_drop_releases_active_stream() {
        let device = FakeDevice::default();
        {
            let mut session = CaptureSession::new(device.clone());
            session.start(Instant::now()).unwrap();
        }
        assert_eq!(device.hw.borrow().released, 1);
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        let a = CaptureSession::new(FakeDevice::default());
        let b = CaptureSession::new(FakeDevice::default());
        assert_ne!(a.id(), b.id());
    }
}
