//! Pixel math for the blending combinators.
//!
//! All functions expect their inputs at equal dimensions; callers resample
//! first.

use image::{Rgba, RgbaImage};

/// Blends `a` into `b` along the line from `(x1, y1)` to `(x2, y2)`.
///
/// Coordinates are fractions of the image size: pixel `(x, y)` lies at
/// `(x / (w - 1), y / (h - 1))`. The blend weight is the pixel's projection
/// onto the segment, clamped to `[0, 1]`; 0 gives `a`, 1 gives `b`.
pub fn linear_blend(a: &RgbaImage, b: &RgbaImage, x1: f64, y1: f64, x2: f64, y2: f64) -> RgbaImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (w, h) = a.dimensions();
    let dx = x2 - x1;
    let dy = y2 - y1;
    let len_sq = dx * dx + dy * dy;

    let mut out = RgbaImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let t = if len_sq > 0.0 {
            let px_x = fraction(x, w);
            let px_y = fraction(y, h);
            (((px_x - x1) * dx + (px_y - y1) * dy) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        *px = lerp_pixel(*a.get_pixel(x, y), *b.get_pixel(x, y), t);
    }
    out
}

/// Takes `light` where `mask` is bright and `dark` where it is dark.
///
/// The mask weight is its Rec. 601 luminance scaled by its alpha, so a
/// transparent mask pixel selects `dark`.
pub fn masked_blend(light: &RgbaImage, dark: &RgbaImage, mask: &RgbaImage) -> RgbaImage {
    debug_assert_eq!(light.dimensions(), dark.dimensions());
    debug_assert_eq!(light.dimensions(), mask.dimensions());

    let mut out = RgbaImage::new(light.width(), light.height());
    for (((px, l), d), m) in out
        .pixels_mut()
        .zip(light.pixels())
        .zip(dark.pixels())
        .zip(mask.pixels())
    {
        let w = f64::from(mask_value(*m)) / 255.0;
        *px = lerp_pixel(*d, *l, w);
    }
    out
}

/// Replaces the alpha channel of `img` by the mask value of `mask`.
///
/// RGB channels are left untouched.
pub fn set_alpha(img: &mut RgbaImage, mask: &RgbaImage) {
    debug_assert_eq!(img.dimensions(), mask.dimensions());
    for (px, m) in img.pixels_mut().zip(mask.pixels()) {
        px.0[3] = mask_value(*m);
    }
}

/// Luminance of a mask pixel scaled by its alpha.
pub fn mask_value(px: Rgba<u8>) -> u8 {
    let [r, g, b, a] = px.0;
    let luma = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b) + 500) / 1000;
    ((luma * u32::from(a) + 127) / 255) as u8
}

fn fraction(i: u32, len: u32) -> f64 {
    if len <= 1 {
        0.0
    } else {
        f64::from(i) / f64::from(len - 1)
    }
}

fn lerp_pixel(a: Rgba<u8>, b: Rgba<u8>, t: f64) -> Rgba<u8> {
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    let mix = |i: usize| -> u8 {
        let v = f64::from(a[i]) * (1.0 - t) + f64::from(b[i]) * t;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([mix(0), mix(1), mix(2), mix(3)])
}
