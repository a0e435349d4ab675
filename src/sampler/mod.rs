//! Fixed-interval RMS sampling of a live analysis buffer.
//!
//! The sampler keeps one [`AmplitudeTimeline`] per capture session. Pausing
//! only disarms the interval; history is dropped solely when a different
//! session is bound.

use crate::analyser::TimeDomainSource;
use crate::capture::{SessionBinding, SessionId, SessionState};
use crate::error::{Result, WavebarsError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerOptions {
    pub interval: Duration,
    /// Gain applied to the raw RMS before clamping to 1.0.
    pub amplitude_scale: f32,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            amplitude_scale: 1.5,
        }
    }
}

impl SamplerOptions {
    /// # Errors
    /// `InvalidConfig` for a zero interval or a negative/non-finite scale.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(WavebarsError::InvalidConfig("sample interval must be non-zero".into()));
        }
        if !self.amplitude_scale.is_finite() || self.amplitude_scale < 0.0 {
            return Err(WavebarsError::InvalidConfig(format!(
                "amplitude_scale must be a non-negative number, got {}",
                self.amplitude_scale
            )));
        }
        Ok(())
    }
}

/// RMS of byte-domain samples centred on 128, scaled and clamped to `[0, 1]`.
pub fn rms_amplitude(buffer: &[u8], amplitude_scale: f32) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = buffer
        .iter()
        .map(|&b| {
            let s = (b as f32 - 128.0) / 128.0;
            s * s
        })
        .sum();
    ((sum_squares / buffer.len() as f32).sqrt() * amplitude_scale).min(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(usize) + Send>;

struct TimelineShared {
    values: RwLock<Vec<f32>>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
}

/// Append-only amplitude history with change notification.
///
/// Clones share the same storage. Readers borrow the values through
/// [`AmplitudeTimeline::read`]; nothing is copied per append. Subscribers are
/// called with the new length after the write lock is released, and must not
/// subscribe or unsubscribe from inside the callback.
#[derive(Clone)]
pub struct AmplitudeTimeline {
    shared: Arc<TimelineShared>,
}

impl Default for AmplitudeTimeline {
    fn default() -> Self {
        Self {
            shared: Arc::new(TimelineShared {
                values: RwLock::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }
}

impl std::fmt::Debug for AmplitudeTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmplitudeTimeline").field("len", &self.len()).finish()
    }
}

impl AmplitudeTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<f32>> {
        self.shared.values.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<f32>> {
        self.shared.values.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        self.shared.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copies the current values. Meant for exports, not per-frame use.
    pub fn snapshot(&self) -> Vec<f32> {
        self.read().clone()
    }

    pub fn subscribe(&self, callback: impl FnMut(usize) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers().push((id, Box::new(callback)));
        id
    }

    /// Returns whether a subscriber was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    pub(crate) fn push(&self, value: f32) {
        let len = {
            let mut values = self.write();
            values.push(value);
            values.len()
        };
        self.notify(len);
    }

    pub(crate) fn clear(&self) {
        self.write().clear();
        self.notify(0);
    }

    fn notify(&self, len: usize) {
        for (_, callback) in self.subscribers().iter_mut() {
            callback(len);
        }
    }
}

/// Appends one RMS value per interval while the bound session records.
pub struct AmplitudeSampler {
    options: SamplerOptions,
    timeline: AmplitudeTimeline,
    bound: Option<SessionId>,
    next_due: Option<Instant>,
    running: bool,
}

impl AmplitudeSampler {
    /// # Errors
    /// `InvalidConfig` if `options` fail validation.
    pub fn new(options: SamplerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            timeline: AmplitudeTimeline::new(),
            bound: None,
            next_due: None,
            running: true,
        })
    }

    pub fn options(&self) -> SamplerOptions {
        self.options
    }

    /// Shared read handle for the renderer.
    pub fn timeline(&self) -> &AmplitudeTimeline {
        &self.timeline
    }

    pub fn bound_session(&self) -> Option<SessionId> {
        self.bound
    }

    /// Whether the interval is currently armed.
    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Advances the interval timer against the bound session's state.
    ///
    /// Returns `true` if a value was appended. At most one value is appended
    /// per call; a late poll does not replay missed ticks.
    pub fn poll<S>(&mut self, now: Instant, binding: Option<SessionBinding>, source: &mut S) -> bool
    where
        S: TimeDomainSource + ?Sized,
    {
        if !self.running {
            return false;
        }
        let Some(binding) = binding else {
            self.next_due = None;
            return false;
        };

        if self.bound != Some(binding.id) {
            self.rebind(binding.id);
        }

        if binding.state != SessionState::Recording {
            if self.next_due.take().is_some() {
                tracing::debug!("Sampler paused at {} samples", self.timeline.len());
            }
            return false;
        }

        let Some(due) = self.next_due else {
            self.next_due = Some(now + self.options.interval);
            return false;
        };
        if now < due {
            return false;
        }

        let mut next = due + self.options.interval;
        if next <= now {
            next = now + self.options.interval;
        }
        self.next_due = Some(next);

        match source.read_time_domain() {
            Some(buffer) => {
                let amplitude = rms_amplitude(buffer, self.options.amplitude_scale);
                self.timeline.push(amplitude);
                true
            }
            None => false,
        }
    }

    fn rebind(&mut self, id: SessionId) {
        if !self.timeline.is_empty() {
            tracing::debug!("Sampler reset for new session {}", id);
            self.timeline.clear();
        }
        self.bound = Some(id);
        self.next_due = None;
    }

    /// Disarms the timer for good; later polls are ignored until [`start`](Self::start).
    pub fn stop(&mut self) {
        self.running = false;
        self.next_due = None;
    }

    pub fn start(&mut self) {
        self.running = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Hands out constant-valued buffers in order.
    struct ScriptedSource {
        queue: VecDeque<u8>,
        current: Vec<u8>,
        reads: usize,
    }

    impl ScriptedSource {
        fn new(levels: &[u8]) -> Self {
            Self {
                queue: levels.iter().copied().collect(),
                current: Vec::new(),
                reads: 0,
            }
        }
    }

    impl TimeDomainSource for ScriptedSource {
        fn read_time_domain(&mut self) -> Option<&[u8]> {
            self.reads += 1;
            let level = self.queue.pop_front().unwrap_or(128);
            self.current = vec![level; 16];
            Some(&self.current)
        }
    }

    fn binding(id: SessionId, state: SessionState) -> Option<SessionBinding> {
        Some(SessionBinding { id, state })
    }

    fn unit_sampler() -> AmplitudeSampler {
        AmplitudeSampler::new(SamplerOptions {
            interval: Duration::from_millis(50),
            amplitude_scale: 1.0,
        })
        .unwrap()
    }

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_rms_of_byte_buffers() {
        assert_eq!(rms_amplitude(&[128; 32], 1.5), 0.0);
        assert_eq!(rms_amplitude(&[192; 8], 1.0), 0.5);
        assert_eq!(rms_amplitude(&[192; 8], 1.5), 0.75);
        assert_eq!(rms_amplitude(&[255, 0], 4.0), 1.0);
        assert_eq!(rms_amplitude(&[], 1.0), 0.0);
    }

    #[test]
    fn test_pause_resume_preserves_history() {
        let id = SessionId::for_test(10);
        let mut sampler = unit_sampler();
        // Levels map to 0.25, 0.5, 0.75, 0.125, 1.0.
        let mut source = ScriptedSource::new(&[160, 192, 224, 144, 0]);
        let t0 = Instant::now();

        sampler.poll(t0, binding(id, SessionState::Recording), &mut source);
        for tick in 1..=3 {
            assert!(sampler.poll(ms(t0, 50 * tick), binding(id, SessionState::Recording), &mut source));
        }

        // Paused for a long stretch: nothing sampled, nothing cleared.
        for millis in [200, 400, 5_000] {
            assert!(!sampler.poll(ms(t0, millis), binding(id, SessionState::Paused), &mut source));
        }
        assert!(!sampler.is_armed());

        sampler.poll(ms(t0, 5_000), binding(id, SessionState::Recording), &mut source);
        assert!(sampler.poll(ms(t0, 5_050), binding(id, SessionState::Recording), &mut source));
        assert!(sampler.poll(ms(t0, 5_100), binding(id, SessionState::Recording), &mut source));

        assert_eq!(sampler.timeline().snapshot(), vec![0.25, 0.5, 0.75, 0.125, 1.0]);
        assert_eq!(source.reads, 5);
    }

    #[test]
    fn test_new_session_clears_timeline() {
        let first = SessionId::for_test(11);
        let second = SessionId::for_test(12);
        let mut sampler = unit_sampler();
        let mut source = ScriptedSource::new(&[192, 192, 192]);
        let t0 = Instant::now();

        sampler.poll(t0, binding(first, SessionState::Recording), &mut source);
        sampler.poll(ms(t0, 50), binding(first, SessionState::Recording), &mut source);
        sampler.poll(ms(t0, 100), binding(first, SessionState::Stopped), &mut source);
        assert_eq!(sampler.timeline().len(), 1);

        sampler.poll(ms(t0, 150), binding(second, SessionState::Idle), &mut source);
        assert!(sampler.timeline().is_empty());
        assert_eq!(sampler.bound_session(), Some(second));
    }

    #[test]
    fn test_late_poll_samples_once() {
        let id = SessionId::for_test(13);
        let mut sampler = unit_sampler();
        let mut source = ScriptedSource::new(&[]);
        let t0 = Instant::now();

        sampler.poll(t0, binding(id, SessionState::Recording), &mut source);
        assert!(!sampler.poll(ms(t0, 49), binding(id, SessionState::Recording), &mut source));
        assert!(sampler.poll(ms(t0, 500), binding(id, SessionState::Recording), &mut source));
        assert!(!sampler.poll(ms(t0, 510), binding(id, SessionState::Recording), &mut source));
        assert!(sampler.poll(ms(t0, 550), binding(id, SessionState::Recording), &mut source));
        assert_eq!(sampler.timeline().len(), 2);
    }

    #[test]
    fn test_subscribers_see_each_append() {
        let timeline = AmplitudeTimeline::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let id = timeline.subscribe(move |len| sink.store(len, Ordering::SeqCst));

        timeline.push(0.1);
        timeline.push(0.2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        assert!(timeline.unsubscribe(id));
        assert!(!timeline.unsubscribe(id));
        timeline.push(0.3);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(timeline.read().as_slice(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_stopped_sampler_ignores_polls() {
        let id = SessionId::for_test(14);
        let mut sampler = unit_sampler();
        let mut source = ScriptedSource::new(&[]);
        let t0 = Instant::now();

        sampler.poll(t0, binding(id, SessionState::Recording), &mut source);
        sampler.stop();
        assert!(!sampler.poll(ms(t0, 100), binding(id, SessionState::Recording), &mut source));
        assert_eq!(source.reads, 0);
    }

    #[test]
    fn test_options_validation() {
        assert!(SamplerOptions::default().validate().is_ok());
        let zero = SamplerOptions {
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        let negative = SamplerOptions {
            amplitude_scale: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }
}
