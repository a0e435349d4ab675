//! Bar layout and pointer math, all in CSS pixels.

use super::style::BarStyle;

/// Shortest bar ever drawn, so silence still shows as a line.
pub const MIN_BAR_HEIGHT: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// How many whole bars fit in `width`.
pub fn bar_count(width: f32, style: &BarStyle) -> usize {
    let pitch = style.pitch();
    if pitch <= 0.0 || width <= 0.0 {
        return 0;
    }
    (width / pitch).floor() as usize
}

/// Vertically centred bar for `amplitude` at slot `index`.
pub fn bar_rect(index: usize, amplitude: f32, viewport_height: f32, style: &BarStyle) -> Rect {
    let height = (amplitude * viewport_height * style.height_scale).max(MIN_BAR_HEIGHT);
    Rect {
        x: index as f32 * style.pitch(),
        y: (viewport_height - height) / 2.0,
        width: style.bar_width,
        height,
    }
}

/// Grow-to-fit canvas width; never smaller than `previous_width`.
pub fn grow_canvas_width(data_len: usize, style: &BarStyle, previous_width: f32) -> f32 {
    (data_len as f32 * style.pitch()).max(previous_width)
}

/// Reduces `data` to `bars` values, each the maximum of the range it covers.
///
/// Data that already fits is returned unchanged.
pub fn compress_max_pool(data: &[f32], bars: usize) -> Vec<f32> {
    if data.len() <= bars {
        return data.to_vec();
    }
    if bars == 0 {
        return Vec::new();
    }

    let len = data.len();
    (0..bars)
        .map(|i| {
            let start = i * len / bars;
            let end = ((i + 1) * len / bars).max(start + 1);
            data[start..end].iter().copied().fold(0.0, f32::max)
        })
        .collect()
}

/// X position of the playhead, or `None` when the duration is unknown.
pub fn playhead_x(current_time: f64, duration: f64, width: f32) -> Option<f32> {
    if !(duration.is_finite() && duration > 0.0) || !current_time.is_finite() {
        return None;
    }
    let ratio = (current_time / duration).clamp(0.0, 1.0);
    Some((ratio * width as f64) as f32)
}

/// Media time under a pointer at `x`, clamped to `[0, duration]`.
pub fn seek_time(x: f32, width: f32, duration: f64) -> f64 {
    if width <= 0.0 || !(duration.is_finite() && duration > 0.0) {
        return 0.0;
    }
    (x as f64 / width as f64).clamp(0.0, 1.0) * duration
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_count_floors() {
        let style = BarStyle::default();
        assert_eq!(bar_count(10.0, &style), 3);
        assert_eq!(bar_count(2.9, &style), 0);
        assert_eq!(bar_count(-5.0, &style), 0);
    }

    #[test]
    fn test_bar_rect_centres_and_floors_height() {
        let style = BarStyle {
            height_scale: 0.5,
            ..Default::default()
        };
        let full = bar_rect(2, 1.0, 100.0, &style);
        assert_eq!(full, Rect { x: 6.0, y: 25.0, width: 2.0, height: 50.0 });

        let silent = bar_rect(0, 0.0, 100.0, &style);
        assert_eq!(silent.height, MIN_BAR_HEIGHT);
        assert_eq!(silent.y, 49.0);
    }

    #[test]
    fn test_grow_width_never_shrinks() {
        let style = BarStyle::default();
        assert_eq!(grow_canvas_width(10, &style, 0.0), 30.0);
        assert_eq!(grow_canvas_width(5, &style, 30.0), 30.0);
        assert_eq!(grow_canvas_width(20, &style, 30.0), 60.0);
    }

    #[test]
    fn test_max_pool_keeps_peaks() {
        let data = [0.1, 0.9, 0.2, 0.3, 0.8, 0.1, 0.0, 0.4];
        assert_eq!(compress_max_pool(&data, 4), vec![0.9, 0.3, 0.8, 0.4]);
        assert_eq!(compress_max_pool(&data, 3), vec![0.9, 0.8, 0.4]);
        assert_eq!(compress_max_pool(&data[..2], 4), vec![0.1, 0.9]);
        assert!(compress_max_pool(&data, 0).is_empty());
    }

    #[test]
    fn test_seek_math() {
        assert!((seek_time(50.0, 100.0, 10.0) - 5.0).abs() < 1e-9);
        assert_eq!(seek_time(0.0, 100.0, 10.0), 0.0);
        assert_eq!(seek_time(100.0, 100.0, 10.0), 10.0);
        assert_eq!(seek_time(140.0, 100.0, 10.0), 10.0);
        assert_eq!(seek_time(50.0, 0.0, 10.0), 0.0);
    }

    #[test]
    fn test_playhead_position() {
        assert_eq!(playhead_x(2.5, 10.0, 200.0), Some(50.0));
        assert_eq!(playhead_x(20.0, 10.0, 200.0), Some(200.0));
        assert_eq!(playhead_x(1.0, 0.0, 200.0), None);
        assert_eq!(playhead_x(1.0, f64::NAN, 200.0), None);
    }
}
