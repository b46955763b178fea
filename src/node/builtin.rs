//! Built-in images that do not come from any package.

use image::{Rgba, RgbaImage};

use super::svg::render_svg;
use crate::error::{GenerateError, GenerateResult};

/// Size of the larger dimension of a rendered built-in image.
pub const BUILT_IN_SIZE: u32 = 64;

const BOOL_YES: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"><path d="M2 9 L6 13 L14 3" fill="none" stroke="#1a7f1a" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/></svg>"##;
const BOOL_NO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"><path d="M3 3 L13 13 M13 3 L3 13" fill="none" stroke="#b01c1c" stroke-width="2.5" stroke-linecap="round"/></svg>"##;
const SORT_ASC: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"><path d="M8 3 L14 12 L2 12 Z" fill="#404040"/></svg>"##;
const SORT_DESC: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"><path d="M8 13 L14 4 L2 4 Z" fill="#404040"/></svg>"##;

enum BuiltIn {
    Svg(&'static str),
    Blank,
}

const TABLE: &[(&str, BuiltIn)] = &[
    ("bool_yes", BuiltIn::Svg(BOOL_YES)),
    ("bool_no", BuiltIn::Svg(BOOL_NO)),
    ("sort_asc", BuiltIn::Svg(SORT_ASC)),
    ("sort_desc", BuiltIn::Svg(SORT_DESC)),
    ("blank", BuiltIn::Blank),
];

/// Names of every built-in image.
pub fn built_in_names() -> impl Iterator<Item = &'static str> {
    TABLE.iter().map(|(name, _)| *name)
}

/// Returns true if `name` is a built-in image.
pub fn is_built_in(name: &str) -> bool {
    TABLE.iter().any(|(n, _)| *n == name)
}

/// Loads a built-in image at its natural size.
pub fn load_built_in(name: &str) -> GenerateResult<RgbaImage> {
    let (_, entry) = TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .ok_or_else(|| GenerateError::UnknownBuiltIn(name.to_string()))?;

    match entry {
        BuiltIn::Svg(svg) => render_svg(svg.as_bytes(), BUILT_IN_SIZE)
            .map_err(|message| GenerateError::invalid_svg(name, message)),
        BuiltIn::Blank => Ok(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]))),
    }
}
