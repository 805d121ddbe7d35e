//! Color model: HSV plus white-mix to RGB conversion and interpolation helpers.
//!
//! Everything in here is pure. Colors are described by a hue on the unit
//! circle (`[0, 1)`), a saturation in `[0, 1]`, a white-mix blend factor in
//! `[0, 1]` applied after the HSV conversion, and a brightness percentage that
//! scales the final channels. The HSV value component is always 1.

use std::f32::consts::PI;
use std::fmt;

/// An 8-bit RGB triple as sent to the strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Reasons a user supplied hex color is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    /// Not exactly six hex digits (after an optional `#`)
    InvalidLength(usize),
    /// A character outside `0-9a-fA-F`
    InvalidDigit(char),
}

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorParseError::InvalidLength(len) => {
                write!(f, "expected 6 hex digits (RRGGBB), got {len}")
            }
            ColorParseError::InvalidDigit(ch) => write!(f, "invalid hex digit '{ch}'"),
        }
    }
}

impl std::error::Error for ColorParseError {}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB` or `#RRGGBB`.
    pub fn from_hex(input: &str) -> Result<Self, ColorParseError> {
        let digits = input.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);

        let count = digits.chars().count();
        if count != 6 {
            return Err(ColorParseError::InvalidLength(count));
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidDigit(bad));
        }

        // All six chars are ASCII hex digits, so byte slicing and parsing cannot fail
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).unwrap_or(0);
        Ok(Self::new(channel(0), channel(2), channel(4)))
    }

    /// Uppercase `RRGGBB`.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Hue and saturation of this color, discarding the value component.
    pub fn hue_sat(self) -> (f32, f32) {
        rgb_to_hue_sat(
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }

    /// Mean channel value, used to pick readable text over a swatch.
    pub fn luma_mean(self) -> u16 {
        (u16::from(self.r) + u16::from(self.g) + u16::from(self.b)) / 3
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// The predefined palette offered by the controller, in display order.
pub const PRESETS: [Rgb; 17] = [
    Rgb::new(0xFF, 0x00, 0x00),
    Rgb::new(0x00, 0xFF, 0x00),
    Rgb::new(0x00, 0x00, 0xFF),
    Rgb::new(0xFF, 0xFF, 0xFF),
    Rgb::new(0xFF, 0xFF, 0x00),
    Rgb::new(0x00, 0xFF, 0xFF),
    Rgb::new(0xFF, 0x00, 0xFF),
    Rgb::new(0xFF, 0xA5, 0x00),
    Rgb::new(0x80, 0x00, 0x80),
    Rgb::new(0xFF, 0xC0, 0xCB),
    Rgb::new(0x00, 0xFF, 0x7F),
    Rgb::new(0x00, 0x80, 0x80),
    Rgb::new(0xE6, 0xE6, 0xFA),
    Rgb::new(0x80, 0x00, 0x00),
    Rgb::new(0x00, 0x00, 0x80),
    Rgb::new(0x80, 0x80, 0x00),
    Rgb::new(0x00, 0x00, 0x00),
];

/// Wrap a value onto `[0, 1)`.
///
/// `rem_euclid` alone can return exactly `1.0` for tiny negative inputs.
pub fn wrap_unit(x: f32) -> f32 {
    let wrapped = x.rem_euclid(1.0);
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolate hues along the shorter arc of the color wheel.
pub fn lerp_hue(a: f32, b: f32, t: f32) -> f32 {
    let diff = wrap_unit(b - a + 0.5) - 0.5;
    wrap_unit(a + diff * t)
}

/// Circular distance between two hues, at most 0.5.
pub fn hue_distance(a: f32, b: f32) -> f32 {
    let d = (wrap_unit(a) - wrap_unit(b)).abs();
    d.min(1.0 - d)
}

/// Standard HSV to RGB on floats in `[0, 1]`.
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (v, v, v);
    }

    let h6 = wrap_unit(h) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match (sector as i32).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// HSV (value fixed at 1) to RGB, then blended toward white by `white_mix`.
///
/// Channels are truncated toward zero.
pub fn hsv_white_to_rgb(hue: f32, saturation: f32, white_mix: f32) -> Rgb {
    let (r, g, b) = hsv_to_rgb(hue, saturation.clamp(0.0, 1.0), 1.0);
    let w = white_mix.clamp(0.0, 1.0);
    let blend = |c: f32| ((1.0 - w) * c * 255.0 + w * 255.0) as u8;
    Rgb::new(blend(r), blend(g), blend(b))
}

/// Scale every channel by `brightness / 100`, clamped to `[0, 1]`.
pub fn scale_by_brightness(rgb: Rgb, brightness: f32) -> Rgb {
    let factor = (brightness / 100.0).clamp(0.0, 1.0);
    let scale = |c: u8| (f32::from(c) * factor) as u8;
    Rgb::new(scale(rgb.r), scale(rgb.g), scale(rgb.b))
}

/// Standard RGB to HSV on floats in `[0, 1]`, returning only hue and saturation.
///
/// Grays (including black) have hue 0 and saturation 0.
pub fn rgb_to_hue_sat(r: f32, g: f32, b: f32) -> (f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);

    if max <= 0.0 || (max - min).abs() <= f32::EPSILON {
        return (0.0, 0.0);
    }

    let delta = max - min;
    let saturation = delta / max;

    let rc = (max - r) / delta;
    let gc = (max - g) / delta;
    let bc = (max - b) / delta;

    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };

    (wrap_unit(h / 6.0), saturation)
}

/// Map a point on a color wheel of the given radius to hue and saturation.
///
/// The angle is measured from the negative x axis, so hue 0 (red) sits on the
/// left edge. Points beyond the rim are clamped to full saturation.
pub fn wheel_pick(dx: f32, dy: f32, radius: f32) -> (f32, f32) {
    let angle = (dy.atan2(dx) + PI).rem_euclid(2.0 * PI);
    let hue = wrap_unit(angle / (2.0 * PI));
    let distance = (dx * dx + dy * dy).sqrt();
    let saturation = if radius > 0.0 {
        (distance / radius).min(1.0)
    } else {
        0.0
    };
    (hue, saturation)
}
