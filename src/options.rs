//! Rendering parameters passed into every `generate` call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::package::Package;
use crate::symbol::{DEFAULT_SYMBOL_SIZE, SvgSymbolRasterizer, SymbolRasterizer};

static DEFAULT_RASTERIZER: SvgSymbolRasterizer = SvgSymbolRasterizer::new(DEFAULT_SYMBOL_SIZE);

/// How a source is fitted into a target size that has a different aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "kebab-case")]
pub enum PreserveAspect {
    /// Resize to exactly the target size, distorting if needed.
    #[default]
    Stretch,
    /// Scale to fit inside the target, centered on a transparent canvas.
    FitLetterbox,
    /// Scale to cover the target, cropping the overflow around the center.
    FitCrop,
}

/// Options for generating an image.
///
/// A width or height of 0 keeps the natural dimension of the input. The
/// package handles are borrowed; they outlive every generation that uses them.
#[derive(Clone, Copy)]
pub struct Options<'a> {
    pub width: u32,
    pub height: u32,
    pub preserve_aspect: PreserveAspect,
    pub saturate: bool,
    /// Package to load images from.
    pub package: Option<&'a dyn Package>,
    /// Package to load symbols from.
    pub symbol_package: Option<&'a dyn Package>,
    /// Renderer used by symbol leaves.
    pub rasterizer: &'a dyn SymbolRasterizer,
}

impl Default for Options<'_> {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            preserve_aspect: PreserveAspect::Stretch,
            saturate: false,
            package: None,
            symbol_package: None,
            rasterizer: &DEFAULT_RASTERIZER,
        }
    }
}

impl<'a> Options<'a> {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_aspect(mut self, preserve_aspect: PreserveAspect) -> Self {
        self.preserve_aspect = preserve_aspect;
        self
    }

    pub fn with_saturate(mut self, saturate: bool) -> Self {
        self.saturate = saturate;
        self
    }

    pub fn with_package(mut self, package: &'a dyn Package) -> Self {
        self.package = Some(package);
        self
    }

    pub fn with_symbol_package(mut self, package: &'a dyn Package) -> Self {
        self.symbol_package = Some(package);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: &'a dyn SymbolRasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Returns the package-free part of these options.
    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            width: self.width,
            height: self.height,
            preserve_aspect: self.preserve_aspect,
            saturate: self.saturate,
        }
    }
}

impl fmt::Debug for Options<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("preserve_aspect", &self.preserve_aspect)
            .field("saturate", &self.saturate)
            .field("package", &self.package.is_some())
            .field("symbol_package", &self.symbol_package.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RenderSettings
// ============================================================================

/// Serializable rendering settings, without the package handles.
///
/// ```json
/// { "width": 375, "height": 523, "preserveAspect": "fit-letterbox", "saturate": false }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct RenderSettings {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub preserve_aspect: PreserveAspect,
    #[serde(default)]
    pub saturate: bool,
}

impl RenderSettings {
    /// Builds options bound to the given packages.
    pub fn options<'a>(
        &self,
        package: Option<&'a dyn Package>,
        symbol_package: Option<&'a dyn Package>,
    ) -> Options<'a> {
        Options {
            width: self.width,
            height: self.height,
            preserve_aspect: self.preserve_aspect,
            saturate: self.saturate,
            package,
            symbol_package,
            ..Options::default()
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
