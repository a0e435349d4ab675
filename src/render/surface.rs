//! Drawing surface seam and an in-memory command recorder.

use super::geometry::Rect;
use super::style::Color;

/// Immediate-mode 2D drawing in CSS-pixel units.
pub trait DrawContext {
    /// Replaces the current transform with a uniform scale.
    fn set_scale(&mut self, scale: f32);

    /// Erases everything inside `width` x `height` (CSS pixels).
    fn clear(&mut self, width: f32, height: f32);

    /// Starts a new path, discarding any unfilled shapes.
    fn begin_path(&mut self);

    fn rect(&mut self, rect: Rect);

    fn round_rect(&mut self, rect: Rect, radius: f32);

    /// Fills every shape added since `begin_path` in one call.
    fn fill(&mut self, color: Color);

    fn fill_rect(&mut self, rect: Rect, color: Color);
}

/// A resizable drawing target.
pub trait Surface {
    type Context: DrawContext;

    /// Backing buffer size in device pixels.
    fn backing_size(&self) -> (u32, u32);

    /// Resizes the backing buffer. Implementations discard existing contents.
    fn set_backing_size(&mut self, width: u32, height: u32);

    fn context(&mut self) -> &mut Self::Context;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rect(Rect),
    RoundRect(Rect, f32),
}

impl Shape {
    pub fn bounds(&self) -> Rect {
        match *self {
            Shape::Rect(r) | Shape::RoundRect(r, _) => r,
        }
    }

    pub fn radius(&self) -> f32 {
        match *self {
            Shape::Rect(_) => 0.0,
            Shape::RoundRect(_, radius) => radius,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Fill { color: Color, shapes: Vec<Shape> },
    FillRect { rect: Rect, color: Color },
}

/// Records the commands of the current frame.
///
/// `clear` drops previously recorded commands, so after a render the list
/// holds exactly what is visible.
#[derive(Debug, Clone)]
pub struct DisplayList {
    backing: (u32, u32),
    scale: f32,
    commands: Vec<DrawCommand>,
    path: Vec<Shape>,
    resize_count: usize,
    fill_count: usize,
}

impl DisplayList {
    pub fn new() -> Self {
        Self {
            backing: (0, 0),
            scale: 1.0,
            commands: Vec::new(),
            path: Vec::new(),
            resize_count: 0,
            fill_count: 0,
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Number of backing-buffer resizes so far.
    pub fn resize_count(&self) -> usize {
        self.resize_count
    }

    /// Number of fill calls since creation.
    pub fn fill_count(&self) -> usize {
        self.fill_count
    }

    /// Every visible filled shape with its color, in paint order.
    pub fn shapes(&self) -> impl Iterator<Item = (Shape, Color)> + '_ {
        self.commands.iter().flat_map(|cmd| {
            let items: Vec<(Shape, Color)> = match cmd {
                DrawCommand::Fill { color, shapes } => shapes.iter().map(|s| (*s, *color)).collect(),
                DrawCommand::FillRect { rect, color } => vec![(Shape::Rect(*rect), *color)],
            };
            items
        })
    }
}

impl Default for DisplayList {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawContext for DisplayList {
    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn clear(&mut self, _width: f32, _height: f32) {
        self.commands.clear();
        self.path.clear();
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn rect(&mut self, rect: Rect) {
        self.path.push(Shape::Rect(rect));
    }

    fn round_rect(&mut self, rect: Rect, radius: f32) {
        self.path.push(Shape::RoundRect(rect, radius));
    }

    fn fill(&mut self, color: Color) {
        self.fill_count += 1;
        let shapes = std::mem::take(&mut self.path);
        self.commands.push(DrawCommand::Fill { color, shapes });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.fill_count += 1;
        self.commands.push(DrawCommand::FillRect { rect, color });
    }
}

impl Surface for DisplayList {
    type Context = Self;

    fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.backing = (width, height);
        self.commands.clear();
        self.resize_count += 1;
    }

    fn context(&mut self) -> &mut Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f32) -> Rect {
        Rect { x, y: 0.0, width: 1.0, height: 1.0 }
    }

    #[test]
    fn test_fill_batches_path() {
        let mut list = DisplayList::new();
        list.begin_path();
        list.rect(rect(0.0));
        list.round_rect(rect(2.0), 0.5);
        list.fill(Color::rgb(1, 2, 3));

        assert_eq!(list.fill_count(), 1);
        let shapes: Vec<_> = list.shapes().collect();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[1].0.radius(), 0.5);
    }

    #[test]
    fn test_clear_and_resize_drop_commands() {
        let mut list = DisplayList::new();
        list.fill_rect(rect(0.0), Color::rgb(0, 0, 0));
        list.clear(10.0, 10.0);
        assert_eq!(list.shapes().count(), 0);

        list.fill_rect(rect(0.0), Color::rgb(0, 0, 0));
        list.set_backing_size(20, 10);
        assert_eq!(list.shapes().count(), 0);
        assert_eq!(list.backing_size(), (20, 10));
        assert_eq!(list.resize_count(), 1);
    }
}
