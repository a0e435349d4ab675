//! Colors and bar styling.

use crate::error::{Result, WavebarsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An sRGB color with alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
    ///
    /// # Errors
    /// `InvalidConfig` for anything else.
    pub fn parse_hex(input: &str) -> Result<Self> {
        let invalid = || WavebarsError::InvalidConfig(format!("invalid color '{input}', expected #rgb, #rrggbb or #rrggbbaa"));
        let hex = input.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

        match hex.len() {
            3 => {
                let nibble = |i: usize| byte(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 | 8 => Ok(Self {
                r: byte(&hex[0..2])?,
                g: byte(&hex[2..4])?,
                b: byte(&hex[4..6])?,
                a: if hex.len() == 8 { byte(&hex[6..8])? } else { 255 },
            }),
            _ => Err(invalid()),
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Alpha as a fraction, for formats that want opacity separately.
    pub fn opacity(self) -> f32 {
        self.a as f32 / 255.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = WavebarsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = WavebarsError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse_hex(&s)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

/// Bar appearance for one render call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarStyle {
    pub bar_width: f32,
    pub gap: f32,
    pub radius: f32,
    /// Fraction of the viewport height a full-amplitude bar may occupy.
    pub height_scale: f32,
    pub color: Color,
}

impl BarStyle {
    pub const DEFAULT_COLOR: Color = Color::rgb(0xce, 0xe0, 0xdc);

    /// Horizontal distance from one bar's left edge to the next.
    pub fn pitch(&self) -> f32 {
        self.bar_width + self.gap
    }

    /// # Errors
    /// `InvalidConfig` for a non-positive bar width, a negative gap or
    /// radius, or a height scale outside `(0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(self.bar_width.is_finite() && self.bar_width > 0.0) {
            return Err(WavebarsError::InvalidConfig(format!("bar_width must be positive, got {}", self.bar_width)));
        }
        if !(self.gap.is_finite() && self.gap >= 0.0) {
            return Err(WavebarsError::InvalidConfig(format!("gap must be non-negative, got {}", self.gap)));
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(WavebarsError::InvalidConfig(format!("radius must be non-negative, got {}", self.radius)));
        }
        if !(self.height_scale > 0.0 && self.height_scale <= 1.0) {
            return Err(WavebarsError::InvalidConfig(format!(
                "height_scale must be within (0, 1], got {}",
                self.height_scale
            )));
        }
        Ok(())
    }
}

impl Default for BarStyle {
    fn default() -> Self {
        Self {
            bar_width: 2.0,
            gap: 1.0,
            radius: 0.0,
            height_scale: 0.9,
            color: Self::DEFAULT_COLOR,
        }
    }
}

/// Partial style where unset fields fall through to a lower layer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarStyleOverrides {
    pub bar_width: Option<f32>,
    pub gap: Option<f32>,
    pub radius: Option<f32>,
    pub height_scale: Option<f32>,
    pub color: Option<Color>,
}

impl BarStyleOverrides {
    /// Per-call values win over `component`, which wins over the built-in default.
    pub fn resolve(per_call: &Self, component: &Self) -> BarStyle {
        let base = BarStyle::default();
        BarStyle {
            bar_width: per_call.bar_width.or(component.bar_width).unwrap_or(base.bar_width),
            gap: per_call.gap.or(component.gap).unwrap_or(base.gap),
            radius: per_call.radius.or(component.radius).unwrap_or(base.radius),
            height_scale: per_call.height_scale.or(component.height_scale).unwrap_or(base.height_scale),
            color: per_call.color.or(component.color).unwrap_or(base.color),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayheadStyle {
    pub color: Color,
    pub width: f32,
}

impl Default for PlayheadStyle {
    fn default() -> Self {
        Self {
            color: Color::rgb(0xff, 0x3b, 0x30),
            width: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(Color::parse_hex("#fff").unwrap(), Color::rgb(255, 255, 255));
        assert_eq!(Color::parse_hex("#cee0dc").unwrap(), BarStyle::DEFAULT_COLOR);
        assert_eq!(
            Color::parse_hex("#10203080").unwrap(),
            Color { r: 0x10, g: 0x20, b: 0x30, a: 0x80 }
        );
        assert_eq!("#FF3B30".parse::<Color>().unwrap(), PlayheadStyle::default().color);
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        for bad in ["", "fff", "#ff", "#ggg", "#12345", "#ÿÿÿ"] {
            assert!(Color::parse_hex(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_hex_round_trip_keeps_alpha() {
        assert_eq!(Color::rgb(1, 2, 3).to_hex(), "#010203");
        assert_eq!(Color { r: 1, g: 2, b: 3, a: 4 }.to_hex(), "#01020304");
    }

    #[test]
    fn test_style_precedence() {
        let per_call = BarStyleOverrides {
            bar_width: Some(4.0),
            ..Default::default()
        };
        let component = BarStyleOverrides {
            bar_width: Some(3.0),
            gap: Some(2.0),
            ..Default::default()
        };

        let style = BarStyleOverrides::resolve(&per_call, &component);
        assert_eq!(style.bar_width, 4.0);
        assert_eq!(style.gap, 2.0);
        assert_eq!(style.radius, 0.0);
        assert_eq!(style.color, BarStyle::DEFAULT_COLOR);
        assert_eq!(style.pitch(), 6.0);
    }

    #[test]
    fn test_style_validation() {
        assert!(BarStyle::default().validate().is_ok());
        let zero_width = BarStyle { bar_width: 0.0, ..Default::default() };
        assert!(zero_width.validate().is_err());
        let tall = BarStyle { height_scale: 1.2, ..Default::default() };
        assert!(tall.validate().is_err());
    }
}
