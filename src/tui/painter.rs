//! Paints a recorded frame into terminal cells.
//!
//! One cell covers [`CELL_WIDTH_PX`] by [`CELL_HEIGHT_PX`] CSS pixels and is
//! split into two half-blocks vertically, so the default bar pitch of 3 px
//! lands one bar per column.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;
use wavebars::render::{Color as BarColor, DisplayList};
use wavebars::Viewport;

pub const CELL_WIDTH_PX: f32 = 3.0;
pub const CELL_HEIGHT_PX: f32 = 8.0;
const HALF_HEIGHT_PX: f32 = CELL_HEIGHT_PX / 2.0;

/// CSS-pixel viewport matching a terminal area.
pub fn viewport_for(area: Rect) -> Viewport {
    Viewport::new(
        f32::from(area.width) * CELL_WIDTH_PX,
        f32::from(area.height) * CELL_HEIGHT_PX,
    )
}

/// CSS x at the centre of terminal column `column` inside `area`.
pub fn column_to_x(area: Rect, column: u16) -> f32 {
    (f32::from(column.saturating_sub(area.x)) + 0.5) * CELL_WIDTH_PX
}

fn to_terminal_color(c: BarColor) -> Option<Color> {
    (c.a > 0).then_some(Color::Rgb(c.r, c.g, c.b))
}

/// Widget drawing the shapes of a [`DisplayList`], shifted left by `scroll_x`.
pub struct DisplayListView<'a> {
    list: &'a DisplayList,
    scroll_x: f32,
    background: Color,
}

impl<'a> DisplayListView<'a> {
    pub fn new(list: &'a DisplayList) -> Self {
        Self {
            list,
            scroll_x: 0.0,
            background: Color::Rgb(0, 0, 0),
        }
    }

    pub fn scroll_x(mut self, scroll_x: f32) -> Self {
        self.scroll_x = scroll_x;
        self
    }

    pub fn background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    /// Half-cell colors, row-major, `2 * height` rows of `width` columns.
    fn rasterize(&self, width: usize, height: usize) -> Vec<Option<Color>> {
        let rows = height * 2;
        let mut halves = vec![None; width * rows];

        for (shape, color) in self.list.shapes() {
            let Some(color) = to_terminal_color(color) else {
                continue;
            };
            let r = shape.bounds();
            let left = r.x - self.scroll_x;
            let right = left + r.width;

            // A column is covered when the shape spans its centre.
            let first_col = ((left / CELL_WIDTH_PX) - 0.5).ceil().max(0.0) as usize;
            let last_col = ((right / CELL_WIDTH_PX) - 0.5).ceil().max(0.0) as usize;
            // Any vertical overlap lights a half-cell, so minimum-height bars stay visible.
            let first_row = (r.y / HALF_HEIGHT_PX).floor().max(0.0) as usize;
            let last_row = (r.bottom() / HALF_HEIGHT_PX).ceil().max(0.0) as usize;

            for row in first_row..last_row.min(rows) {
                for col in first_col..last_col.min(width) {
                    halves[row * width + col] = Some(color);
                }
            }
        }
        halves
    }
}

impl Widget for DisplayListView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = usize::from(area.width);
        let height = usize::from(area.height);
        let halves = self.rasterize(width, height);

        for row in 0..height {
            for col in 0..width {
                let top = halves[(row * 2) * width + col];
                let bottom = halves[(row * 2 + 1) * width + col];
                let (symbol, style) = match (top, bottom) {
                    (Some(t), Some(b)) if t == b => ("█", Style::default().fg(t).bg(self.background)),
                    (Some(t), Some(b)) => ("▀", Style::default().fg(t).bg(b)),
                    (Some(t), None) => ("▀", Style::default().fg(t).bg(self.background)),
                    (None, Some(b)) => ("▄", Style::default().fg(b).bg(self.background)),
                    (None, None) => (" ", Style::default().bg(self.background)),
                };
                // Coordinates are bounded by the area, which fits u16.
                let x = area.x + col as u16;
                let y = area.y + row as u16;
                buf.set_string(x, y, symbol, style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavebars::render::{DrawContext, Rect as CssRect};

    fn cell(buf: &Buffer, x: u16, y: u16) -> &str {
        buf[(x, y)].symbol()
    }

    #[test]
    fn test_one_bar_per_column_at_default_pitch() {
        let mut list = DisplayList::new();
        list.begin_path();
        // Full-height bar in column 0, half-height centred bar in column 1.
        list.rect(CssRect { x: 0.0, y: 0.0, width: 2.0, height: 16.0 });
        list.rect(CssRect { x: 3.0, y: 4.0, width: 2.0, height: 8.0 });
        list.fill(BarColor::rgb(255, 255, 255));

        let area = Rect::new(0, 0, 3, 2);
        let mut buf = Buffer::empty(area);
        DisplayListView::new(&list).render(area, &mut buf);

        assert_eq!(cell(&buf, 0, 0), "█");
        assert_eq!(cell(&buf, 0, 1), "█");
        assert_eq!(cell(&buf, 1, 0), "▄");
        assert_eq!(cell(&buf, 1, 1), "▀");
        assert_eq!(cell(&buf, 2, 0), " ");
    }

    #[test]
    fn test_scroll_shifts_shapes_left() {
        let mut list = DisplayList::new();
        list.begin_path();
        list.rect(CssRect { x: 6.0, y: 0.0, width: 2.0, height: 8.0 });
        list.fill(BarColor::rgb(1, 2, 3));

        let area = Rect::new(0, 0, 3, 1);
        let mut buf = Buffer::empty(area);
        DisplayListView::new(&list).scroll_x(3.0).render(area, &mut buf);

        assert_eq!(cell(&buf, 1, 0), "█");
        assert_eq!(cell(&buf, 2, 0), " ");
    }

    #[test]
    fn test_viewport_and_column_mapping() {
        let area = Rect::new(2, 1, 10, 4);
        assert_eq!(viewport_for(area), Viewport::new(30.0, 32.0));
        assert_eq!(column_to_x(area, 2), 1.5);
        assert_eq!(column_to_x(area, 5), 10.5);
    }
}
