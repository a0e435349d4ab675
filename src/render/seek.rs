//! Seek intent from pointer and keyboard input on a static waveform.
//!
//! The controller never moves playback itself; it reports target times and
//! leaves transport to the caller.

use super::geometry::seek_time;

/// Keyboard step for Left/Right.
pub const DEFAULT_SEEK_STEP_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(f32),
    Move(f32),
    Up(f32),
    /// The gesture was interrupted (pointer left, focus lost).
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekKey {
    Left,
    Right,
    Home,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekOptions {
    pub enabled: bool,
    /// Report continuous drag positions instead of single clicks.
    pub drag: bool,
    pub step_secs: f64,
}

impl Default for SeekOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            drag: false,
            step_secs: DEFAULT_SEEK_STEP_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    start_x: f32,
    last_time: f64,
    moved: bool,
}

type TimeCallback = Box<dyn FnMut(f64)>;

pub struct SeekController {
    options: SeekOptions,
    width: f32,
    duration: f64,
    current_time: f64,
    gesture: Option<Gesture>,
    on_seek: Option<TimeCallback>,
    on_drag_update: Option<TimeCallback>,
    on_drag_end: Option<TimeCallback>,
}

impl SeekController {
    pub fn new(options: SeekOptions) -> Self {
        Self {
            options,
            width: 0.0,
            duration: 0.0,
            current_time: 0.0,
            gesture: None,
            on_seek: None,
            on_drag_update: None,
            on_drag_end: None,
        }
    }

    pub fn options(&self) -> SeekOptions {
        self.options
    }

    /// Changes options; an in-flight gesture is abandoned without callbacks.
    pub fn set_options(&mut self, options: SeekOptions) {
        self.options = options;
        self.gesture = None;
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = width;
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration;
    }

    /// Mirrors the caller's playback position, used as the keyboard origin.
    pub fn set_current_time(&mut self, current_time: f64) {
        self.current_time = current_time;
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn is_dragging(&self) -> bool {
        self.options.drag && self.gesture.is_some()
    }

    pub fn on_seek(&mut self, callback: impl FnMut(f64) + 'static) {
        self.on_seek = Some(Box::new(callback));
    }

    pub fn on_drag_update(&mut self, callback: impl FnMut(f64) + 'static) {
        self.on_drag_update = Some(Box::new(callback));
    }

    pub fn on_drag_end(&mut self, callback: impl FnMut(f64) + 'static) {
        self.on_drag_end = Some(Box::new(callback));
    }

    fn active(&self) -> bool {
        self.options.enabled && self.duration.is_finite() && self.duration > 0.0
    }

    fn emit(callback: &mut Option<TimeCallback>, time: f64) {
        if let Some(callback) = callback.as_mut() {
            callback(time);
        }
    }

    /// Feeds one pointer event. Returns the time reported, if any.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<f64> {
        if !self.active() {
            self.gesture = None;
            return None;
        }

        match event {
            PointerEvent::Down(x) => {
                let time = seek_time(x, self.width, self.duration);
                self.gesture = Some(Gesture {
                    start_x: x,
                    last_time: time,
                    moved: false,
                });
                if self.options.drag {
                    Self::emit(&mut self.on_drag_update, time);
                    return Some(time);
                }
                None
            }
            PointerEvent::Move(x) => {
                let time = seek_time(x, self.width, self.duration);
                let drag = self.options.drag;
                let gesture = self.gesture.as_mut()?;
                gesture.last_time = time;
                if x != gesture.start_x {
                    gesture.moved = true;
                }
                if drag {
                    Self::emit(&mut self.on_drag_update, time);
                    return Some(time);
                }
                None
            }
            PointerEvent::Up(x) => {
                let gesture = self.gesture.take()?;
                let time = seek_time(x, self.width, self.duration);
                if self.options.drag {
                    self.current_time = time;
                    Self::emit(&mut self.on_drag_end, time);
                    return Some(time);
                }
                // A pointer that wandered between down and up is not a click.
                if gesture.moved || x != gesture.start_x {
                    return None;
                }
                self.current_time = time;
                Self::emit(&mut self.on_seek, time);
                Some(time)
            }
            PointerEvent::Cancel => {
                let gesture = self.gesture.take()?;
                if self.options.drag {
                    Self::emit(&mut self.on_drag_end, gesture.last_time);
                    return Some(gesture.last_time);
                }
                None
            }
        }
    }

    /// Applies a keyboard seek. Returns the new time if seeking is enabled.
    pub fn handle_key(&mut self, key: SeekKey) -> Option<f64> {
        if !self.active() {
            return None;
        }
        let time = match key {
            SeekKey::Left => self.current_time - self.options.step_secs,
            SeekKey::Right => self.current_time + self.options.step_secs,
            SeekKey::Home => 0.0,
            SeekKey::End => self.duration,
        }
        .clamp(0.0, self.duration);

        self.current_time = time;
        Self::emit(&mut self.on_seek, time);
        Some(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Calls {
        seek: Vec<f64>,
        drag_update: Vec<f64>,
        drag_end: Vec<f64>,
    }

    fn controller(drag: bool) -> (SeekController, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut seek = SeekController::new(SeekOptions {
            drag,
            ..Default::default()
        });
        seek.set_width(200.0);
        seek.set_duration(10.0);

        let c = Rc::clone(&calls);
        seek.on_seek(move |t| c.borrow_mut().seek.push(t));
        let c = Rc::clone(&calls);
        seek.on_drag_update(move |t| c.borrow_mut().drag_update.push(t));
        let c = Rc::clone(&calls);
        seek.on_drag_end(move |t| c.borrow_mut().drag_end.push(t));
        (seek, calls)
    }

    fn click(seek: &mut SeekController, x: f32) {
        seek.handle_pointer(PointerEvent::Down(x));
        seek.handle_pointer(PointerEvent::Up(x));
    }

    #[test]
    fn test_click_maps_position_to_time() {
        let (mut seek, calls) = controller(false);
        click(&mut seek, 100.0);
        click(&mut seek, 0.0);
        click(&mut seek, 200.0);

        let calls = calls.borrow();
        assert_eq!(calls.seek.len(), 3);
        assert!((calls.seek[0] - 5.0).abs() < 1e-9);
        assert_eq!(calls.seek[1], 0.0);
        assert_eq!(calls.seek[2], 10.0);
    }

    #[test]
    fn test_drag_mode_suppresses_click_seek() {
        let (mut seek, calls) = controller(true);
        click(&mut seek, 100.0);

        let calls = calls.borrow();
        assert!(calls.seek.is_empty());
        assert_eq!(calls.drag_update, vec![5.0]);
        assert_eq!(calls.drag_end, vec![5.0]);
    }

    #[test]
    fn test_click_mode_never_fires_drag_callbacks() {
        let (mut seek, calls) = controller(false);
        seek.handle_pointer(PointerEvent::Down(20.0));
        seek.handle_pointer(PointerEvent::Move(60.0));
        seek.handle_pointer(PointerEvent::Up(60.0));
        click(&mut seek, 40.0);

        let calls = calls.borrow();
        assert!(calls.drag_update.is_empty());
        assert!(calls.drag_end.is_empty());
        // The moved gesture is not a click; the second one is.
        assert_eq!(calls.seek, vec![2.0]);
    }

    #[test]
    fn test_drag_reports_intermediate_positions() {
        let (mut seek, calls) = controller(true);
        seek.handle_pointer(PointerEvent::Down(0.0));
        assert!(seek.is_dragging());
        seek.handle_pointer(PointerEvent::Move(50.0));
        seek.handle_pointer(PointerEvent::Move(250.0));
        seek.handle_pointer(PointerEvent::Up(150.0));

        let calls = calls.borrow();
        assert_eq!(calls.drag_update, vec![0.0, 2.5, 10.0]);
        assert_eq!(calls.drag_end, vec![7.5]);
        assert_eq!(seek.current_time(), 7.5);
    }

    #[test]
    fn test_cancel_ends_drag_at_last_position() {
        let (mut seek, calls) = controller(true);
        seek.handle_pointer(PointerEvent::Down(40.0));
        seek.handle_pointer(PointerEvent::Cancel);
        assert_eq!(calls.borrow().drag_end, vec![2.0]);
        assert!(seek.handle_pointer(PointerEvent::Up(40.0)).is_none());
    }

    #[test]
    fn test_keyboard_steps_and_clamps() {
        let (mut seek, calls) = controller(false);
        seek.set_current_time(3.0);

        assert_eq!(seek.handle_key(SeekKey::Right), Some(8.0));
        assert_eq!(seek.handle_key(SeekKey::Right), Some(10.0));
        assert_eq!(seek.handle_key(SeekKey::Left), Some(5.0));
        assert_eq!(seek.handle_key(SeekKey::Home), Some(0.0));
        assert_eq!(seek.handle_key(SeekKey::Left), Some(0.0));
        assert_eq!(seek.handle_key(SeekKey::End), Some(10.0));
        assert_eq!(calls.borrow().seek.len(), 6);
    }

    #[test]
    fn test_disabled_ignores_everything() {
        let (mut seek, calls) = controller(false);
        seek.set_options(SeekOptions {
            enabled: false,
            ..Default::default()
        });
        click(&mut seek, 100.0);
        assert!(seek.handle_key(SeekKey::End).is_none());

        seek.set_options(SeekOptions::default());
        seek.set_duration(0.0);
        click(&mut seek, 100.0);

        assert!(calls.borrow().seek.is_empty());
    }
}
