//! Symbol rasterization: the boundary to the vector symbol renderer.
//!
//! A symbol is a vector drawing stored in a package. A [`SymbolVariation`]
//! says how it is colored. The generator treats rasterization as a black box
//! behind [`SymbolRasterizer`]; [`SvgSymbolRasterizer`] is the default and
//! renders SVG symbols with resvg.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{GenerateError, GenerateResult};
use crate::node::svg::{SvgColors, render_svg_with_colors};
use crate::package::Package;

/// Resolution of the larger symbol dimension used by the default rasterizer.
pub const DEFAULT_SYMBOL_SIZE: u32 = 500;

/// Monotonic edit counter of an externally edited symbol.
///
/// Only used for equality: a newer age makes cached renders stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(transparent)]
pub struct Age(pub u64);

impl Age {
    /// Returns the next age.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// How the colors of a symbol are filtered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case", tag = "filter")]
pub enum SymbolFilter {
    /// Keep the colors of the drawing.
    #[default]
    Original,
    /// Paint every fill and every border with a single color.
    Solid { fill: [u8; 3], border: [u8; 3] },
}

/// A named way of rendering a symbol (e.g. "common", "rare").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct SymbolVariation {
    pub name: String,
    #[serde(flatten)]
    pub filter: SymbolFilter,
}

impl SymbolVariation {
    pub fn original(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: SymbolFilter::Original,
        }
    }

    pub fn solid(name: impl Into<String>, fill: [u8; 3], border: [u8; 3]) -> Self {
        Self {
            name: name.into(),
            filter: SymbolFilter::Solid { fill, border },
        }
    }
}

/// Renders a symbol from a package.
pub trait SymbolRasterizer: Send + Sync {
    fn rasterize(
        &self,
        package: Option<&dyn Package>,
        filename: &str,
        variation: &SymbolVariation,
    ) -> GenerateResult<RgbaImage>;
}

/// Default rasterizer for SVG symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgSymbolRasterizer {
    size: u32,
}

impl SvgSymbolRasterizer {
    pub const fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Default for SvgSymbolRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOL_SIZE)
    }
}

impl SymbolRasterizer for SvgSymbolRasterizer {
    fn rasterize(
        &self,
        package: Option<&dyn Package>,
        filename: &str,
        variation: &SymbolVariation,
    ) -> GenerateResult<RgbaImage> {
        let package = package.ok_or_else(|| GenerateError::not_found(filename))?;
        let data = package.resolve(filename)?;

        let colors = match variation.filter {
            SymbolFilter::Original => None,
            SymbolFilter::Solid { fill, border } => Some(SvgColors { fill, stroke: border }),
        };
        render_svg_with_colors(&data, self.size, colors)
            .map_err(|message| GenerateError::symbol(filename, message))
    }
}
