//! Combine modes: how a generated image is layered onto a background.
//!
//! Every mode is a separable per-channel function `f(backdrop, source)` on
//! 8-bit values. Alpha is never passed through the mode function; it is
//! handled by the source-over formula in [`combine_over`]:
//!
//! ```text
//! ao = as + ab·(1 - as)
//! co = (as·(1 - ab)·cs + as·ab·f(cb, cs) + (1 - as)·ab·cb) / ao
//! ```

use std::fmt;
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::GenerateError;

/// Compositing operator used when layering an image over a backdrop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum ImageCombine {
    /// The source replaces the backdrop.
    #[default]
    Normal,
    Add,
    Subtract,
    /// Linear light: `backdrop + 2·source - 255`.
    Stamp,
    Difference,
    Negation,
    Multiply,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    Screen,
    Overlay,
    HardLight,
    SoftLight,
    Reflect,
    Glow,
    Freeze,
    Heat,
    And,
    Or,
    Xor,
    /// Multiplies the backdrop by the squared source.
    Shadow,
    /// Average of overlay in both directions.
    SymmetricOverlay,
}

impl ImageCombine {
    /// All modes, in declaration order.
    pub const ALL: [ImageCombine; 24] = [
        Self::Normal,
        Self::Add,
        Self::Subtract,
        Self::Stamp,
        Self::Difference,
        Self::Negation,
        Self::Multiply,
        Self::Darken,
        Self::Lighten,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::Screen,
        Self::Overlay,
        Self::HardLight,
        Self::SoftLight,
        Self::Reflect,
        Self::Glow,
        Self::Freeze,
        Self::Heat,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Shadow,
        Self::SymmetricOverlay,
    ];

    /// The snake_case name used in scripts and JSON.
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Stamp => "stamp",
            Self::Difference => "difference",
            Self::Negation => "negation",
            Self::Multiply => "multiply",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::ColorDodge => "color_dodge",
            Self::ColorBurn => "color_burn",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::HardLight => "hard_light",
            Self::SoftLight => "soft_light",
            Self::Reflect => "reflect",
            Self::Glow => "glow",
            Self::Freeze => "freeze",
            Self::Heat => "heat",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shadow => "shadow",
            Self::SymmetricOverlay => "symmetric_overlay",
        }
    }

    /// Applies this mode to one channel.
    pub fn channel(self, backdrop: u8, source: u8) -> u8 {
        let b = i32::from(backdrop);
        let s = i32::from(source);
        let out = match self {
            Self::Normal => s,
            Self::Add => b + s,
            Self::Subtract => b - s,
            Self::Stamp => b + 2 * s - 255,
            Self::Difference => (b - s).abs(),
            Self::Negation => 255 - (255 - b - s).abs(),
            Self::Multiply => mul255(b, s),
            Self::Darken => b.min(s),
            Self::Lighten => b.max(s),
            Self::ColorDodge => dodge(b, s),
            Self::ColorBurn => burn(b, s),
            Self::Screen => 255 - mul255(255 - b, 255 - s),
            Self::Overlay => overlay(b, s),
            Self::HardLight => overlay(s, b),
            Self::SoftLight => ((255 - 2 * s) * b * b / 255 + 2 * s * b + 127) / 255,
            Self::Reflect => reflect(b, s),
            Self::Glow => reflect(s, b),
            Self::Freeze => freeze(b, s),
            Self::Heat => freeze(s, b),
            Self::And => b & s,
            Self::Or => b | s,
            Self::Xor => b ^ s,
            Self::Shadow => (b * s * s + 32512) / 65025,
            Self::SymmetricOverlay => (overlay(b, s) + overlay(s, b) + 1) / 2,
        };
        out.clamp(0, 255) as u8
    }

    /// Composites one straight-alpha `source` pixel over a `backdrop` pixel.
    pub fn composite(self, backdrop: Rgba<u8>, source: Rgba<u8>) -> Rgba<u8> {
        let sa = f32::from(source[3]) / 255.0;
        let ba = f32::from(backdrop[3]) / 255.0;
        let out_a = sa + ba * (1.0 - sa);

        if out_a <= 0.0 {
            return Rgba([0, 0, 0, 0]);
        }

        let mix = |i: usize| -> u8 {
            let cs = f32::from(source[i]);
            let cb = f32::from(backdrop[i]);
            let cm = f32::from(self.channel(backdrop[i], source[i]));
            let out = (sa * (1.0 - ba) * cs + sa * ba * cm + (1.0 - sa) * ba * cb) / out_a;
            out.round().clamp(0.0, 255.0) as u8
        };

        Rgba([
            mix(0),
            mix(1),
            mix(2),
            (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
        ])
    }
}

impl fmt::Display for ImageCombine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageCombine {
    type Err = GenerateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace([' ', '-'], "_").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| GenerateError::UnknownCombine(s.to_string()))
    }
}

/// Composites `source` over `backdrop` pixel-wise.
///
/// Both images must have the same dimensions; the output has them too.
pub fn combine_over(backdrop: &RgbaImage, source: &RgbaImage, mode: ImageCombine) -> RgbaImage {
    debug_assert_eq!(backdrop.dimensions(), source.dimensions());
    let mut out = backdrop.clone();
    for (dst, src) in out.pixels_mut().zip(source.pixels()) {
        *dst = mode.composite(*dst, *src);
    }
    out
}

fn mul255(a: i32, b: i32) -> i32 {
    (a * b + 127) / 255
}

fn overlay(b: i32, s: i32) -> i32 {
    if b < 128 {
        2 * b * s / 255
    } else {
        255 - 2 * (255 - b) * (255 - s) / 255
    }
}

fn dodge(b: i32, s: i32) -> i32 {
    if s == 255 { 255 } else { b * 255 / (255 - s) }
}

fn burn(b: i32, s: i32) -> i32 {
    if s == 0 { 0 } else { 255 - (255 - b) * 255 / s }
}

fn reflect(b: i32, s: i32) -> i32 {
    if s == 255 { 255 } else { b * b / (255 - s) }
}

fn freeze(b: i32, s: i32) -> i32 {
    if s == 0 {
        0
    } else {
        255 - (255 - b) * (255 - b) / s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for mode in ImageCombine::ALL {
            assert_eq!(mode.name().parse::<ImageCombine>().unwrap(), mode);
        }
        assert_eq!("Color Dodge".parse::<ImageCombine>().unwrap(), ImageCombine::ColorDodge);
        assert_eq!("hard-light".parse::<ImageCombine>().unwrap(), ImageCombine::HardLight);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "sparkle".parse::<ImageCombine>().unwrap_err();
        assert!(matches!(err, GenerateError::UnknownCombine(ref s) if s == "sparkle"));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ImageCombine::SymmetricOverlay).unwrap();
        assert_eq!(json, "\"symmetric_overlay\"");
        let back: ImageCombine = serde_json::from_str("\"color_burn\"").unwrap();
        assert_eq!(back, ImageCombine::ColorBurn);
    }

    #[test]
    fn channel_identities() {
        for v in [0u8, 1, 77, 128, 254, 255] {
            assert_eq!(ImageCombine::Multiply.channel(v, 255), v);
            assert_eq!(ImageCombine::Screen.channel(v, 0), v);
            assert_eq!(ImageCombine::Add.channel(v, 0), v);
            assert_eq!(ImageCombine::Subtract.channel(v, 0), v);
            assert_eq!(ImageCombine::Difference.channel(v, v), 0);
            assert_eq!(ImageCombine::Normal.channel(0, v), v);
            assert_eq!(ImageCombine::Xor.channel(v, v), 0);
        }
    }

    #[test]
    fn channel_saturates() {
        assert_eq!(ImageCombine::Add.channel(200, 100), 255);
        assert_eq!(ImageCombine::Subtract.channel(100, 200), 0);
        assert_eq!(ImageCombine::ColorDodge.channel(10, 255), 255);
        assert_eq!(ImageCombine::ColorBurn.channel(10, 0), 0);
        assert_eq!(ImageCombine::Darken.channel(10, 20), 10);
        assert_eq!(ImageCombine::Lighten.channel(10, 20), 20);
    }

    #[test]
    fn normal_opaque_source_replaces_backdrop() {
        let out = ImageCombine::Normal.composite(Rgba([255, 0, 0, 255]), Rgba([0, 0, 255, 255]));
        assert_eq!(out, Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn transparent_source_leaves_backdrop() {
        for mode in ImageCombine::ALL {
            let out = mode.composite(Rgba([10, 20, 30, 255]), Rgba([200, 200, 200, 0]));
            assert_eq!(out, Rgba([10, 20, 30, 255]), "{mode}");
        }
    }

    #[test]
    fn transparent_backdrop_yields_source() {
        let out = ImageCombine::Multiply.composite(Rgba([0, 0, 0, 0]), Rgba([100, 110, 120, 200]));
        assert_eq!(out, Rgba([100, 110, 120, 200]));
    }

    #[test]
    fn combine_over_applies_mode_per_pixel() {
        let backdrop = RgbaImage::from_pixel(2, 2, Rgba([200, 100, 50, 255]));
        let source = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 255, 255]));
        let out = combine_over(&backdrop, &source, ImageCombine::Multiply);
        assert_eq!(out.get_pixel(1, 1).0, [200, 0, 50, 255]);
    }
}
