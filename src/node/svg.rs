//! SVG rasterization using resvg/usvg.
//!
//! Shared by the built-in image table and the default symbol rasterizer.

use image::{Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};

/// Replacement colors for fills and strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgColors {
    pub fill: [u8; 3],
    pub stroke: [u8; 3],
}

/// Renders SVG data to an RGBA image.
///
/// The SVG is scaled so that its larger dimension is `size` pixels. Returns
/// the parse error message if the data is not valid SVG.
pub fn render_svg(svg_data: &[u8], size: u32) -> Result<RgbaImage, String> {
    render_svg_with_colors(svg_data, size, None)
}

/// Renders SVG data, optionally replacing every fill and stroke color.
///
/// `none` and `transparent` paints are kept as they are.
pub fn render_svg_with_colors(
    svg_data: &[u8],
    size: u32,
    colors: Option<SvgColors>,
) -> Result<RgbaImage, String> {
    let tree = match colors {
        Some(colors) => {
            let text = std::str::from_utf8(svg_data).map_err(|e| e.to_string())?;
            let recolored = replace_svg_colors(text, colors);
            Tree::from_str(&recolored, &Options::default())
        }
        None => Tree::from_data(svg_data, &Options::default()),
    }
    .map_err(|e| e.to_string())?;

    render_tree(&tree, size).ok_or_else(|| "svg has an empty canvas".to_string())
}

fn render_tree(tree: &Tree, size: u32) -> Option<RgbaImage> {
    let svg_size = tree.size();
    let scale = (size as f32) / svg_size.width().max(svg_size.height());
    let width = (svg_size.width() * scale).ceil().max(1.0) as u32;
    let height = (svg_size.height() * scale).ceil().max(1.0) as u32;

    let mut pixmap = Pixmap::new(width, height)?;
    resvg::render(tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());
    Some(pixmap_to_rgba_image(&pixmap))
}

fn replace_svg_colors(svg_data: &str, colors: SvgColors) -> String {
    let hex = |[r, g, b]: [u8; 3]| format!("#{r:02x}{g:02x}{b:02x}");
    let fill = hex(colors.fill);
    let stroke = hex(colors.stroke);

    let result = replace_color_attr(svg_data, "fill", &fill);
    let result = replace_color_attr(&result, "stroke", &stroke);
    replace_style_colors(&result, &fill, &stroke)
}

/// Replaces a color attribute value, preserving "none" values.
fn replace_color_attr(svg: &str, attr: &str, new_color: &str) -> String {
    rewrite_attr(svg, attr, |value| {
        if is_unpainted(value) {
            value.to_string()
        } else {
            new_color.to_string()
        }
    })
}

/// Replaces `fill` and `stroke` declarations inside `style` attributes.
fn replace_style_colors(svg: &str, fill: &str, stroke: &str) -> String {
    rewrite_attr(svg, "style", |style| {
        style
            .split(';')
            .map(|decl| {
                let Some((prop, value)) = decl.split_once(':') else {
                    return decl.to_string();
                };
                let color = match prop.trim() {
                    "fill" => fill,
                    "stroke" => stroke,
                    _ => return decl.to_string(),
                };
                if is_unpainted(value.trim()) {
                    decl.to_string()
                } else {
                    format!("{prop}:{color}")
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    })
}

fn is_unpainted(value: &str) -> bool {
    value == "none" || value == "transparent"
}

/// Rewrites the value of every `attr` attribute with `rewrite`.
///
/// The attribute name must follow whitespace; both quote styles and spaces
/// around `=` are accepted.
fn rewrite_attr(svg: &str, attr: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    let mut result = String::with_capacity(svg.len());
    let mut copied = 0;

    for (start, _) in svg.match_indices(attr) {
        if start < copied {
            continue;
        }
        let after_space = svg[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_whitespace());
        if !after_space {
            continue;
        }
        let Some((value_start, value_end)) = attr_value(svg, start + attr.len()) else {
            continue;
        };

        result.push_str(&svg[copied..value_start]);
        result.push_str(&rewrite(&svg[value_start..value_end]));
        copied = value_end;
    }

    result.push_str(&svg[copied..]);
    result
}

/// Byte range of the quoted value following an attribute name ending at `i`.
fn attr_value(svg: &str, mut i: usize) -> Option<(usize, usize)> {
    let bytes = svg.as_bytes();
    let skip_space = |mut i: usize| {
        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }
        i
    };

    i = skip_space(i);
    if bytes.get(i) != Some(&b'=') {
        return None;
    }
    i = skip_space(i + 1);

    let quote = *bytes.get(i)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let start = i + 1;
    let len = svg[start..].find(char::from(quote))?;
    Some((start, start + len))
}

/// Converts a premultiplied tiny_skia pixmap to a straight-alpha image.
fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let (r, g, b, a) = unpremultiply(src.red(), src.green(), src.blue(), src.alpha());
        *dst = Rgba([r, g, b, a]);
    }
    img
}

fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> (u8, u8, u8, u8) {
    if a == 0 {
        (0, 0, 0, 0)
    } else {
        let a_f = a as f32 / 255.0;
        (
            (r as f32 / a_f).round().min(255.0) as u8,
            (g as f32 / a_f).round().min(255.0) as u8,
            (b as f32 / a_f).round().min(255.0) as u8,
            a,
        )
    }
}
