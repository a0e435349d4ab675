//! Explicitly started and stopped animation-frame scheduling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default frame interval, roughly 60 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Cloneable "needs redraw" flag for data publishers.
#[derive(Debug, Clone, Default)]
pub struct Invalidator(Arc<AtomicBool>);

impl Invalidator {
    pub fn invalidate(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// At least one resize notification arrived since the previous frame.
    pub resized: bool,
}

/// Decides when a frame should be painted.
///
/// Redraws happen on invalidation, on resize, or on every interval while in
/// continuous mode. Any number of resize notifications between two frames
/// collapse into one redraw.
#[derive(Debug)]
pub struct FrameLoop {
    interval: Duration,
    running: bool,
    continuous: bool,
    dirty: bool,
    pending_resize: bool,
    next_frame: Option<Instant>,
    invalidator: Invalidator,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: false,
            continuous: false,
            dirty: false,
            pending_resize: false,
            next_frame: None,
            invalidator: Invalidator::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a frame callback is scheduled.
    pub fn has_pending_frame(&self) -> bool {
        self.running && self.next_frame.is_some()
    }

    pub fn invalidator(&self) -> Invalidator {
        self.invalidator.clone()
    }

    /// Starts scheduling; the first frame is due immediately. Idempotent.
    pub fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        self.dirty = true;
        self.next_frame = Some(now);
    }

    /// Cancels the pending frame and any queued resize. Idempotent.
    pub fn stop(&mut self) {
        self.running = false;
        self.dirty = false;
        self.pending_resize = false;
        self.next_frame = None;
        self.invalidator.take();
    }

    /// Repaint every interval regardless of invalidation.
    pub fn set_continuous(&mut self, continuous: bool) {
        self.continuous = continuous;
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn notify_resize(&mut self) {
        if self.running {
            self.pending_resize = true;
        }
    }

    pub fn request_redraw(&mut self) {
        self.dirty = true;
    }

    /// Returns a tick if a frame should be painted at `now`.
    pub fn next_frame(&mut self, now: Instant) -> Option<FrameTick> {
        if !self.running {
            return None;
        }
        if self.next_frame.is_some_and(|due| now < due) {
            return None;
        }

        let dirty = self.dirty | self.invalidator.take() | self.pending_resize | self.continuous;
        if !dirty {
            return None;
        }

        self.dirty = false;
        self.next_frame = Some(now + self.interval);
        Some(FrameTick {
            resized: std::mem::take(&mut self.pending_resize),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_stopped_loop_never_fires() {
        let mut frames = FrameLoop::default();
        let t0 = Instant::now();
        assert!(frames.next_frame(t0).is_none());

        frames.start(t0);
        frames.stop();
        frames.stop();
        frames.invalidator().invalidate();
        frames.notify_resize();
        assert!(!frames.has_pending_frame());
        assert!(frames.next_frame(ms(t0, 100)).is_none());
    }

    #[test]
    fn test_first_frame_then_only_on_change() {
        let mut frames = FrameLoop::default();
        let t0 = Instant::now();
        frames.start(t0);

        assert!(frames.next_frame(t0).is_some());
        assert!(frames.next_frame(ms(t0, 50)).is_none());

        frames.invalidator().invalidate();
        assert!(frames.next_frame(ms(t0, 60)).is_some());
    }

    #[test]
    fn test_resizes_collapse_into_one_frame() {
        let mut frames = FrameLoop::default();
        let t0 = Instant::now();
        frames.start(t0);
        frames.next_frame(t0);

        frames.notify_resize();
        frames.notify_resize();
        frames.notify_resize();
        // Still inside the current frame interval.
        assert!(frames.next_frame(ms(t0, 5)).is_none());

        assert_eq!(frames.next_frame(ms(t0, 20)), Some(FrameTick { resized: true }));
        assert!(frames.next_frame(ms(t0, 40)).is_none());
    }

    #[test]
    fn test_continuous_mode_paints_every_interval() {
        let mut frames = FrameLoop::new(Duration::from_millis(10));
        let t0 = Instant::now();
        frames.start(t0);
        frames.set_continuous(true);

        let painted = (0..10).filter(|i| frames.next_frame(ms(t0, i * 10)).is_some()).count();
        assert_eq!(painted, 10);
    }
}
