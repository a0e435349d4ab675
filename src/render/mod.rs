//! Bar-chart waveform rendering.
//!
//! A [`Renderer`] paints one frame at a time onto any [`Surface`]. It owns
//! the canvas sizing policy, device-pixel-ratio scaling, the idle placeholder
//! and the playhead overlay. Scheduling lives in [`frame::FrameLoop`], which
//! the renderer starts and stops explicitly.

pub mod frame;
pub mod geometry;
pub mod seek;
pub mod style;
pub mod surface;
pub mod svg;

pub use frame::{FrameLoop, FrameTick, Invalidator};
pub use geometry::Rect;
pub use seek::{PointerEvent, SeekController, SeekKey, SeekOptions};
pub use style::{BarStyle, BarStyleOverrides, Color, PlayheadStyle};
pub use surface::{DisplayList, DrawCommand, DrawContext, Shape, Surface};

use crate::error::{Result, WavebarsError};
use geometry::{bar_count, bar_rect, compress_max_pool, grow_canvas_width, playhead_x};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Instant;

/// Canvas sizing for growing (live) data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthPolicy {
    /// The canvas widens with the data and never shrinks; the view follows the tail.
    Grow,
    /// The canvas matches the viewport; overflowing data is max-pooled to fit.
    #[default]
    Fixed,
}

impl std::str::FromStr for WidthPolicy {
    type Err = WavebarsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grow" => Ok(Self::Grow),
            "fixed" => Ok(Self::Fixed),
            other => Err(WavebarsError::InvalidConfig(format!(
                "unknown width policy '{other}', expected 'grow' or 'fixed'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererOptions {
    pub style: BarStyle,
    pub width_policy: WidthPolicy,
    /// Draw a row of minimum-height bars when there is nothing to show.
    pub show_idle: bool,
    pub device_pixel_ratio: f32,
    pub playhead: PlayheadStyle,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            style: BarStyle::default(),
            width_policy: WidthPolicy::default(),
            show_idle: false,
            device_pixel_ratio: 1.0,
            playhead: PlayheadStyle::default(),
        }
    }
}

impl RendererOptions {
    /// # Errors
    /// `InvalidConfig` for an invalid bar style, device pixel ratio or playhead width.
    pub fn validate(&self) -> Result<()> {
        self.style.validate()?;
        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            return Err(WavebarsError::InvalidConfig(format!(
                "device_pixel_ratio must be positive, got {}",
                self.device_pixel_ratio
            )));
        }
        if !(self.playhead.width.is_finite() && self.playhead.width > 0.0) {
            return Err(WavebarsError::InvalidConfig(format!(
                "playhead width must be positive, got {}",
                self.playhead.width
            )));
        }
        Ok(())
    }
}

/// Visible size of the drawing area in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playhead {
    pub current_time: f64,
    pub duration: f64,
}

/// What to paint in one frame.
#[derive(Debug, Clone, Copy)]
pub enum FrameData<'a> {
    /// Precomputed peaks for a clip, optionally with a playhead.
    Static { peaks: &'a [f32], playhead: Option<Playhead> },
    /// A growing amplitude timeline.
    Live { amplitudes: &'a [f32], recording: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Canvas width in CSS pixels.
    pub canvas_width: f32,
    pub bars_drawn: usize,
    /// The backing buffer was reallocated for this frame.
    pub resized: bool,
    /// Horizontal scroll that keeps the newest bar in view.
    pub scroll_x: f32,
}

pub struct Renderer {
    options: RendererOptions,
    viewport: Viewport,
    frames: FrameLoop,
    grown_width: f32,
    scroll_x: f32,
}

impl Renderer {
    /// # Errors
    /// `InvalidConfig` if `options` fail validation.
    pub fn new(options: RendererOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            viewport: Viewport::default(),
            frames: FrameLoop::default(),
            grown_width: 0.0,
            scroll_x: 0.0,
        })
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    /// Replaces the options and schedules a redraw.
    ///
    /// # Errors
    /// `InvalidConfig` if `options` fail validation; the old options stay.
    pub fn set_options(&mut self, options: RendererOptions) -> Result<()> {
        options.validate()?;
        self.options = options;
        self.frames.request_redraw();
        Ok(())
    }

    pub fn set_style(&mut self, style: BarStyle) -> Result<()> {
        self.set_options(RendererOptions { style, ..self.options })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Records a container resize; repeated calls before the next frame collapse.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.frames.notify_resize();
        }
    }

    pub fn start(&mut self, now: Instant) {
        if !self.frames.is_running() {
            tracing::debug!("Renderer started");
        }
        self.frames.start(now);
    }

    /// Cancels any pending frame. Idempotent.
    pub fn stop(&mut self) {
        if self.frames.is_running() {
            tracing::debug!("Renderer stopped");
        }
        self.frames.stop();
    }

    pub fn is_running(&self) -> bool {
        self.frames.is_running()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.frames.has_pending_frame()
    }

    /// Repaint on every frame interval (live recording) or only on change.
    pub fn set_continuous(&mut self, continuous: bool) {
        self.frames.set_continuous(continuous);
    }

    pub fn request_redraw(&mut self) {
        self.frames.request_redraw();
    }

    /// Handle for data publishers to mark the frame dirty.
    pub fn invalidator(&self) -> Invalidator {
        self.frames.invalidator()
    }

    /// Returns a tick when a frame should be painted now.
    pub fn poll_frame(&mut self, now: Instant) -> Option<FrameTick> {
        self.frames.next_frame(now)
    }

    /// Forgets the grow-to-fit width, for a new recording.
    pub fn reset_growth(&mut self) {
        self.grown_width = 0.0;
        self.scroll_x = 0.0;
    }

    fn canvas_width(&mut self, data: &FrameData<'_>) -> f32 {
        match (data, self.options.width_policy) {
            (FrameData::Live { amplitudes, .. }, WidthPolicy::Grow) => {
                self.grown_width = grow_canvas_width(amplitudes.len(), &self.options.style, self.grown_width);
                self.grown_width
            }
            _ => self.viewport.width,
        }
    }

    /// Paints one frame onto `surface`.
    pub fn render_frame<S: Surface>(&mut self, surface: &mut S, data: FrameData<'_>) -> FrameReport {
        let canvas_width = self.canvas_width(&data);
        let height = self.viewport.height;
        let dpr = self.options.device_pixel_ratio;
        let style = self.options.style;

        let backing = (
            (canvas_width * dpr).ceil().max(0.0) as u32,
            (height * dpr).ceil().max(0.0) as u32,
        );
        let resized = surface.backing_size() != backing;
        if resized {
            surface.set_backing_size(backing.0, backing.1);
            tracing::debug!("Backing buffer resized to {}x{}", backing.0, backing.1);
        }

        let ctx = surface.context();
        ctx.set_scale(dpr);
        ctx.clear(canvas_width, height);

        let (bars, is_idle) = match data {
            FrameData::Static { peaks, .. } => (fit_to_bars(peaks, bar_count(canvas_width, &style)), peaks.is_empty()),
            FrameData::Live { amplitudes, recording } => {
                let bars = match self.options.width_policy {
                    WidthPolicy::Grow => Cow::Borrowed(amplitudes),
                    WidthPolicy::Fixed => fit_to_bars(amplitudes, bar_count(canvas_width, &style)),
                };
                (bars, amplitudes.is_empty() && !recording)
            }
        };

        let bars_drawn = if is_idle {
            if self.options.show_idle {
                draw_bars(ctx, &vec![0.0; bar_count(self.viewport.width, &style)], height, &style)
            } else {
                0
            }
        } else {
            draw_bars(ctx, &bars, height, &style)
        };

        if let FrameData::Static {
            playhead: Some(playhead),
            ..
        } = data
        {
            if let Some(x) = playhead_x(playhead.current_time, playhead.duration, canvas_width) {
                let w = self.options.playhead.width;
                let left = (x - w / 2.0).clamp(0.0, (canvas_width - w).max(0.0));
                ctx.fill_rect(
                    Rect {
                        x: left,
                        y: 0.0,
                        width: w,
                        height,
                    },
                    self.options.playhead.color,
                );
            }
        }

        if let FrameData::Live { recording: true, .. } = data {
            if self.options.width_policy == WidthPolicy::Grow {
                self.scroll_x = (canvas_width - self.viewport.width).max(0.0);
            }
        }
        let scroll_x = match (data, self.options.width_policy) {
            (FrameData::Live { .. }, WidthPolicy::Grow) => self.scroll_x,
            _ => 0.0,
        };

        FrameReport {
            canvas_width,
            bars_drawn,
            resized,
            scroll_x,
        }
    }
}

/// Max-pools `data` down to `bars` values when it does not fit; borrows it otherwise.
fn fit_to_bars(data: &[f32], bars: usize) -> Cow<'_, [f32]> {
    if data.len() <= bars {
        Cow::Borrowed(data)
    } else {
        Cow::Owned(compress_max_pool(data, bars))
    }
}

/// Adds every bar to one path and fills it once.
fn draw_bars<C: DrawContext + ?Sized>(ctx: &mut C, amplitudes: &[f32], height: f32, style: &BarStyle) -> usize {
    if amplitudes.is_empty() {
        return 0;
    }
    ctx.begin_path();
    for (i, &amplitude) in amplitudes.iter().enumerate() {
        let rect = bar_rect(i, amplitude, height, style);
        if style.radius > 0.0 {
            ctx.round_rect(rect, style.radius);
        } else {
            ctx.rect(rect);
        }
    }
    ctx.fill(style.color);
    amplitudes.len()
}
