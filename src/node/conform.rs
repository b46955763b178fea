//! Sizing and color adjustments applied to leaf-loaded images.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use palette::{Hsl, IntoColor, Srgb};

use crate::error::{GenerateError, GenerateResult};
use crate::options::{Options, PreserveAspect};

/// Filter used for every resize. Triangle is bilinear interpolation.
pub const RESAMPLE_FILTER: FilterType = FilterType::Triangle;

/// Relative saturation boost applied when `Options::saturate` is set.
pub const SATURATE_AMOUNT: f32 = 0.4;

/// Largest raster, in pixels, a leaf may be sized to.
pub const MAX_PIXELS: u64 = 1 << 28;

/// Resizes `img` to the size requested by `opt`, honoring the aspect policy.
///
/// A requested width or height of 0 keeps the image's own dimension. Fails
/// with [`GenerateError::ImageTooLarge`] instead of allocating more than
/// [`MAX_PIXELS`].
pub fn conform_image(img: RgbaImage, opt: &Options) -> GenerateResult<RgbaImage> {
    let (src_w, src_h) = img.dimensions();
    let width = if opt.width == 0 { src_w } else { opt.width };
    let height = if opt.height == 0 { src_h } else { opt.height };

    if (width, height) == (src_w, src_h) || src_w == 0 || src_h == 0 {
        return Ok(img);
    }
    check_size(width, height)?;

    let out = match opt.preserve_aspect {
        PreserveAspect::Stretch => resample(&img, width, height),
        PreserveAspect::FitLetterbox => {
            let scale = (width as f64 / src_w as f64).min(height as f64 / src_h as f64);
            let (fit_w, fit_h) = scaled(src_w, src_h, scale, width, height);
            let fitted = resample(&img, fit_w, fit_h);

            let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
            let x = i64::from((width - fit_w) / 2);
            let y = i64::from((height - fit_h) / 2);
            imageops::replace(&mut canvas, &fitted, x, y);
            canvas
        }
        PreserveAspect::FitCrop => {
            let scale = (width as f64 / src_w as f64).max(height as f64 / src_h as f64);
            let cover_w = ((src_w as f64 * scale).round() as u32).max(width);
            let cover_h = ((src_h as f64 * scale).round() as u32).max(height);
            check_size(cover_w, cover_h)?;
            let covered = resample(&img, cover_w, cover_h);

            let x = (cover_w - width) / 2;
            let y = (cover_h - height) / 2;
            imageops::crop_imm(&covered, x, y, width, height).to_image()
        }
    };
    Ok(out)
}

fn check_size(width: u32, height: u32) -> GenerateResult<()> {
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(GenerateError::ImageTooLarge { width, height });
    }
    Ok(())
}

/// Resizes `img` to exactly `width × height`, unless it already has that size.
pub fn resample(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    imageops::resize(img, width, height, RESAMPLE_FILTER)
}

/// Like [`resample`], but takes ownership to skip the copy when no resize is needed.
pub fn resample_into(img: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        img
    } else {
        imageops::resize(&img, width, height, RESAMPLE_FILTER)
    }
}

/// Boosts the saturation of every visible pixel.
pub fn saturate_image(img: &mut RgbaImage, amount: f32) {
    for pixel in img.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }

        let rgb = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        let mut hsl: Hsl = rgb.into_color();
        hsl.saturation = (hsl.saturation * (1.0 + amount)).clamp(0.0, 1.0);
        let out: Srgb = hsl.into_color();

        pixel.0 = [
            (out.red * 255.0).round().clamp(0.0, 255.0) as u8,
            (out.green * 255.0).round().clamp(0.0, 255.0) as u8,
            (out.blue * 255.0).round().clamp(0.0, 255.0) as u8,
            a,
        ];
    }
}

fn scaled(src_w: u32, src_h: u32, scale: f64, max_w: u32, max_h: u32) -> (u32, u32) {
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_square(size: u32) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba([255, 0, 0, 255]))
    }

    #[test]
    fn zero_size_keeps_natural_dimensions() {
        let img = conform_image(red_square(100), &Options::default()).unwrap();
        assert_eq!(img.dimensions(), (100, 100));

        let img = conform_image(red_square(100), &Options::new(50, 0)).unwrap();
        assert_eq!(img.dimensions(), (50, 100));
    }

    #[test]
    fn stretch_fills_target() {
        let img = conform_image(red_square(100), &Options::new(200, 100)).unwrap();
        assert_eq!(img.dimensions(), (200, 100));
        assert!(img.pixels().all(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn letterbox_centers_source_on_transparent_canvas() {
        let opt = Options::new(200, 100).with_aspect(PreserveAspect::FitLetterbox);
        let img = conform_image(red_square(100), &opt).unwrap();
        assert_eq!(img.dimensions(), (200, 100));

        for (x, _, p) in img.enumerate_pixels() {
            if (50..150).contains(&x) {
                assert_eq!(p.0, [255, 0, 0, 255], "x = {x}");
            } else {
                assert_eq!(p.0[3], 0, "x = {x}");
            }
        }
    }

    #[test]
    fn crop_covers_target() {
        let mut img = RgbaImage::from_pixel(100, 50, Rgba([0, 0, 255, 255]));
        for y in 0..50 {
            for x in 0..25 {
                img.put_pixel(x, y, Rgba([0, 255, 0, 255]));
            }
        }
        let opt = Options::new(50, 50).with_aspect(PreserveAspect::FitCrop);
        let out = conform_image(img, &opt).unwrap();
        assert_eq!(out.dimensions(), (50, 50));
        // The green left quarter is cropped away.
        assert!(out.pixels().all(|p| p.0[3] == 255));
        assert_eq!(out.get_pixel(0, 25).0, [0, 0, 255, 255]);
    }

    #[test]
    fn oversized_targets_are_rejected() {
        let err = conform_image(red_square(1), &Options::new(1 << 31, 1 << 31)).unwrap_err();
        assert!(matches!(
            err,
            GenerateError::ImageTooLarge { width, height } if width == 1 << 31 && height == 1 << 31
        ));

        // A thin source cropped to a square would need a huge cover image.
        let thin = RgbaImage::from_pixel(1, 1000, Rgba([0, 0, 0, 255]));
        let opt = Options::new(10_000, 10_000).with_aspect(PreserveAspect::FitCrop);
        assert!(matches!(
            conform_image(thin, &opt),
            Err(GenerateError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn saturate_skips_grey_and_boosts_color() {
        let mut img = RgbaImage::from_pixel(1, 2, Rgba([128, 128, 128, 255]));
        img.put_pixel(0, 1, Rgba([150, 100, 100, 200]));
        saturate_image(&mut img, SATURATE_AMOUNT);

        assert_eq!(img.get_pixel(0, 0).0, [128, 128, 128, 255]);
        let p = img.get_pixel(0, 1).0;
        assert!(p[0] > 150 && p[1] < 100, "{p:?}");
        assert_eq!(p[3], 200);
    }

    #[test]
    fn resample_is_noop_at_same_size() {
        let img = red_square(3);
        assert_eq!(resample(&img, 3, 3), img);
        assert_eq!(resample(&img, 6, 3).dimensions(), (6, 3));
    }
}
