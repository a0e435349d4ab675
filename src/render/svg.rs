//! SVG export of a recorded frame.

use super::style::Color;
use super::surface::{DisplayList, Shape};
use std::fmt::Write;

/// Serializes the visible shapes of `list` into a standalone SVG document.
///
/// `width` and `height` are the CSS-pixel size of the frame; the display
/// list's scale is not applied since SVG is resolution independent.
pub fn to_svg(list: &DisplayList, width: f32, height: f32, background: Option<Color>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = fmt_num(width),
        h = fmt_num(height)
    );

    if let Some(bg) = background {
        let _ = writeln!(
            out,
            r#"  <rect width="100%" height="100%" fill="{}"{}/>"#,
            rgb_hex(bg),
            opacity_attr(bg)
        );
    }

    for (shape, color) in list.shapes() {
        let r = shape.bounds();
        let radius = match shape {
            Shape::RoundRect(_, radius) => format!(r#" rx="{}""#, fmt_num(radius.min(r.width / 2.0))),
            Shape::Rect(_) => String::new(),
        };
        let _ = writeln!(
            out,
            r#"  <rect x="{}" y="{}" width="{}" height="{}"{} fill="{}"{}/>"#,
            fmt_num(r.x),
            fmt_num(r.y),
            fmt_num(r.width),
            fmt_num(r.height),
            radius,
            rgb_hex(color),
            opacity_attr(color)
        );
    }

    out.push_str("</svg>\n");
    out
}

fn rgb_hex(c: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
}

fn opacity_attr(c: Color) -> String {
    if c.a == 255 {
        String::new()
    } else {
        format!(r#" fill-opacity="{}""#, fmt_num(c.opacity()))
    }
}

/// Up to three decimals, trailing zeros trimmed.
fn fmt_num(v: f32) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::geometry::Rect;
    use crate::render::surface::DrawContext;

    #[test]
    fn test_svg_contains_each_shape() {
        let mut list = DisplayList::new();
        list.begin_path();
        list.rect(Rect { x: 0.0, y: 4.5, width: 2.0, height: 1.0 });
        list.round_rect(Rect { x: 3.0, y: 0.0, width: 2.0, height: 10.0 }, 4.0);
        list.fill(Color::rgb(0xce, 0xe0, 0xdc));
        list.fill_rect(
            Rect { x: 1.0, y: 0.0, width: 2.0, height: 10.0 },
            Color { r: 255, g: 0, b: 0, a: 128 },
        );

        let svg = to_svg(&list, 6.0, 10.0, Some(Color::rgb(0, 0, 0)));
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"viewBox="0 0 6 10""#));
        assert!(svg.contains(r##"fill="#000000""##));
        assert!(svg.contains(r##"<rect x="0" y="4.5" width="2" height="1" fill="#cee0dc"/>"##));
        assert!(svg.contains(r#"rx="1""#));
        assert!(svg.contains(r#"fill-opacity="0.502""#));
        assert_eq!(svg.matches("<rect").count(), 4);
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(fmt_num(3.0), "3");
        assert_eq!(fmt_num(0.125), "0.125");
        assert_eq!(fmt_num(-0.0001), "0");
    }
}
