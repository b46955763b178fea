//! The image generation node hierarchy.
//!
//! A [`GeneratedImage`] is one node of an immutable DAG that describes how to
//! build an image. Leaves load pixels (from a package, the built-in table, or
//! a symbol); combinators generate their children with the same [`Options`]
//! and merge the results.
//!
//! # Equality
//!
//! Nodes compare structurally: two separately built trees with the same shape
//! and parameters are equal, and so are their [`structural_hash`]es. The hash
//! is computed once, bottom-up, when a node is constructed. This is what makes
//! [`GenerationCache`](crate::GenerationCache) sound.
//!
//! [`structural_hash`]: GeneratedImage::structural_hash

pub mod blend;
pub mod builtin;
pub mod conform;
pub mod svg;

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use image::RgbaImage;
use xxhash_rust::xxh3::Xxh3;

use crate::combine::{ImageCombine, combine_over};
use crate::error::{GenerateError, GenerateResult};
use crate::options::Options;
use crate::symbol::{Age, SymbolVariation};
use conform::{SATURATE_AMOUNT, conform_image, resample_into, saturate_image};

/// Shared handle to a node. Children are shared between parents.
pub type GeneratedImageRef = Arc<GeneratedImage>;

// ============================================================================
// Variant payloads
// ============================================================================

/// Linearly blends `a` into `b` between two control points.
#[derive(Debug, Clone)]
pub struct LinearBlendImage {
    pub a: GeneratedImageRef,
    pub b: GeneratedImageRef,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Blends `light` and `dark` using a third image as mask.
#[derive(Debug, Clone)]
pub struct MaskedBlendImage {
    pub light: GeneratedImageRef,
    pub dark: GeneratedImageRef,
    pub mask: GeneratedImageRef,
}

/// Layers `a` over `b` with a combine mode.
#[derive(Debug, Clone)]
pub struct CombineBlendImage {
    pub a: GeneratedImageRef,
    pub b: GeneratedImageRef,
    pub mode: ImageCombine,
}

/// Replaces the alpha channel of `image` with `mask`.
#[derive(Debug, Clone)]
pub struct SetMaskImage {
    pub image: GeneratedImageRef,
    pub mask: GeneratedImageRef,
}

/// Overrides the combine mode of `image`.
#[derive(Debug, Clone)]
pub struct SetCombineImage {
    pub image: GeneratedImageRef,
    pub mode: ImageCombine,
}

/// Loads an image file from the image package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedImage {
    pub filename: String,
}

/// Loads an image from the built-in table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltInImage {
    pub name: String,
}

/// Renders a symbol from the symbol package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolToImage {
    pub filename: String,
    /// When the symbol was last updated. Never read during generation.
    pub age: Age,
    pub variation: SymbolVariation,
}

/// Every kind of node.
#[derive(Debug, Clone)]
pub enum ImageKind {
    LinearBlend(LinearBlendImage),
    MaskedBlend(MaskedBlendImage),
    CombineBlend(CombineBlendImage),
    SetMask(SetMaskImage),
    SetCombine(SetCombineImage),
    Packaged(PackagedImage),
    BuiltIn(BuiltInImage),
    Symbol(SymbolToImage),
}

impl ImageKind {
    /// Short snake_case name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LinearBlend(_) => "linear_blend",
            Self::MaskedBlend(_) => "masked_blend",
            Self::CombineBlend(_) => "combine_blend",
            Self::SetMask(_) => "set_mask",
            Self::SetCombine(_) => "set_combine",
            Self::Packaged(_) => "packaged",
            Self::BuiltIn(_) => "built_in",
            Self::Symbol(_) => "symbol",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::LinearBlend(_) => 1,
            Self::MaskedBlend(_) => 2,
            Self::CombineBlend(_) => 3,
            Self::SetMask(_) => 4,
            Self::SetCombine(_) => 5,
            Self::Packaged(_) => 6,
            Self::BuiltIn(_) => 7,
            Self::Symbol(_) => 8,
        }
    }

    /// Direct children, in generation order.
    pub fn children(&self) -> Vec<&GeneratedImageRef> {
        match self {
            Self::LinearBlend(n) => vec![&n.a, &n.b],
            Self::MaskedBlend(n) => vec![&n.light, &n.dark, &n.mask],
            Self::CombineBlend(n) => vec![&n.a, &n.b],
            Self::SetMask(n) => vec![&n.image, &n.mask],
            Self::SetCombine(n) => vec![&n.image],
            Self::Packaged(_) | Self::BuiltIn(_) | Self::Symbol(_) => Vec::new(),
        }
    }

    fn structural_hash(&self) -> u64 {
        let mut h = Xxh3::new();
        h.write_u8(self.tag());
        for child in self.children() {
            h.write_u64(child.hash);
        }
        match self {
            Self::LinearBlend(n) => {
                for c in [n.x1, n.y1, n.x2, n.y2] {
                    h.write_u64(c.to_bits());
                }
            }
            Self::CombineBlend(CombineBlendImage { mode, .. })
            | Self::SetCombine(SetCombineImage { mode, .. }) => mode.hash(&mut h),
            Self::Packaged(n) => n.filename.hash(&mut h),
            Self::BuiltIn(n) => n.name.hash(&mut h),
            Self::Symbol(n) => {
                n.filename.hash(&mut h);
                n.age.hash(&mut h);
                n.variation.hash(&mut h);
            }
            Self::MaskedBlend(_) | Self::SetMask(_) => {}
        }
        h.finish()
    }
}

/// Node pairs already proven equal during one comparison.
type SeenPairs = HashSet<(*const GeneratedImage, *const GeneratedImage)>;

impl ImageKind {
    fn is_leaf(&self) -> bool {
        matches!(self, Self::Packaged(_) | Self::BuiltIn(_) | Self::Symbol(_))
    }

    fn eq_with(&self, other: &Self, seen: &mut SeenPairs) -> bool {
        match (self, other) {
            (Self::LinearBlend(l), Self::LinearBlend(r)) => {
                l.x1.to_bits() == r.x1.to_bits()
                    && l.y1.to_bits() == r.y1.to_bits()
                    && l.x2.to_bits() == r.x2.to_bits()
                    && l.y2.to_bits() == r.y2.to_bits()
                    && l.a.eq_with(&r.a, seen)
                    && l.b.eq_with(&r.b, seen)
            }
            (Self::MaskedBlend(l), Self::MaskedBlend(r)) => {
                l.light.eq_with(&r.light, seen)
                    && l.dark.eq_with(&r.dark, seen)
                    && l.mask.eq_with(&r.mask, seen)
            }
            (Self::CombineBlend(l), Self::CombineBlend(r)) => {
                l.mode == r.mode && l.a.eq_with(&r.a, seen) && l.b.eq_with(&r.b, seen)
            }
            (Self::SetMask(l), Self::SetMask(r)) => {
                l.image.eq_with(&r.image, seen) && l.mask.eq_with(&r.mask, seen)
            }
            (Self::SetCombine(l), Self::SetCombine(r)) => {
                l.mode == r.mode && l.image.eq_with(&r.image, seen)
            }
            (Self::Packaged(l), Self::Packaged(r)) => l == r,
            (Self::BuiltIn(l), Self::BuiltIn(r)) => l == r,
            (Self::Symbol(l), Self::Symbol(r)) => l == r,
            _ => false,
        }
    }
}

impl PartialEq for ImageKind {
    fn eq(&self, other: &Self) -> bool {
        self.eq_with(other, &mut SeenPairs::new())
    }
}

impl Eq for ImageKind {}

// ============================================================================
// GeneratedImage
// ============================================================================

/// An image that is generated from a description.
///
/// Generation is independent of how the description was produced. Nodes are
/// immutable; changing a parameter means building a new node.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    kind: ImageKind,
    hash: u64,
}

impl GeneratedImage {
    /// Wraps a node kind, computing its structural hash.
    pub fn new(kind: ImageKind) -> GeneratedImageRef {
        let hash = kind.structural_hash();
        Arc::new(Self { kind, hash })
    }

    pub fn linear_blend(
        a: GeneratedImageRef,
        b: GeneratedImageRef,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    ) -> GeneratedImageRef {
        Self::new(ImageKind::LinearBlend(LinearBlendImage { a, b, x1, y1, x2, y2 }))
    }

    pub fn masked_blend(
        light: GeneratedImageRef,
        dark: GeneratedImageRef,
        mask: GeneratedImageRef,
    ) -> GeneratedImageRef {
        Self::new(ImageKind::MaskedBlend(MaskedBlendImage { light, dark, mask }))
    }

    pub fn combine_blend(
        a: GeneratedImageRef,
        b: GeneratedImageRef,
        mode: ImageCombine,
    ) -> GeneratedImageRef {
        Self::new(ImageKind::CombineBlend(CombineBlendImage { a, b, mode }))
    }

    pub fn set_mask(image: GeneratedImageRef, mask: GeneratedImageRef) -> GeneratedImageRef {
        Self::new(ImageKind::SetMask(SetMaskImage { image, mask }))
    }

    pub fn set_combine(image: GeneratedImageRef, mode: ImageCombine) -> GeneratedImageRef {
        Self::new(ImageKind::SetCombine(SetCombineImage { image, mode }))
    }

    pub fn packaged(filename: impl Into<String>) -> GeneratedImageRef {
        Self::new(ImageKind::Packaged(PackagedImage {
            filename: filename.into(),
        }))
    }

    pub fn built_in(name: impl Into<String>) -> GeneratedImageRef {
        Self::new(ImageKind::BuiltIn(BuiltInImage { name: name.into() }))
    }

    pub fn symbol(
        filename: impl Into<String>,
        age: Age,
        variation: SymbolVariation,
    ) -> GeneratedImageRef {
        Self::new(ImageKind::Symbol(SymbolToImage {
            filename: filename.into(),
            age,
            variation,
        }))
    }

    pub fn kind(&self) -> &ImageKind {
        &self.kind
    }

    /// Hash of the node's structure; equal nodes have equal hashes.
    pub fn structural_hash(&self) -> u64 {
        self.hash
    }

    /// Number of nodes reachable from this one, counting shared nodes per use.
    pub fn node_count(&self) -> usize {
        1 + self
            .kind
            .children()
            .into_iter()
            .map(|c| c.node_count())
            .sum::<usize>()
    }

    /// How this node's result must be combined with the background.
    pub fn combine(&self) -> ImageCombine {
        match &self.kind {
            ImageKind::LinearBlend(n) => n.a.combine(),
            ImageKind::MaskedBlend(n) => n.light.combine(),
            ImageKind::CombineBlend(n) => n.mode,
            ImageKind::SetMask(n) => n.image.combine(),
            ImageKind::SetCombine(n) => n.mode,
            ImageKind::Packaged(_) | ImageKind::BuiltIn(_) | ImageKind::Symbol(_) => {
                ImageCombine::Normal
            }
        }
    }

    /// Generates the image.
    ///
    /// Child failures propagate unchanged; there is no partial output.
    #[tracing::instrument(level = "debug", skip_all, fields(kind = self.kind.name()))]
    pub fn generate(&self, opt: &Options) -> GenerateResult<RgbaImage> {
        match &self.kind {
            ImageKind::LinearBlend(n) => {
                let a = n.a.generate(opt)?;
                let b = n.b.generate(opt)?;
                let b = resample_into(b, a.width(), a.height());
                Ok(blend::linear_blend(&a, &b, n.x1, n.y1, n.x2, n.y2))
            }
            ImageKind::MaskedBlend(n) => {
                let light = n.light.generate(opt)?;
                let (w, h) = light.dimensions();
                let dark = resample_into(n.dark.generate(opt)?, w, h);
                let mask = resample_into(n.mask.generate(opt)?, w, h);
                Ok(blend::masked_blend(&light, &dark, &mask))
            }
            ImageKind::CombineBlend(n) => {
                let a = n.a.generate(opt)?;
                let b = n.b.generate(opt)?;
                let a = resample_into(a, b.width(), b.height());
                Ok(combine_over(&b, &a, n.mode))
            }
            ImageKind::SetMask(n) => {
                let mut img = n.image.generate(opt)?;
                let mask = resample_into(n.mask.generate(opt)?, img.width(), img.height());
                blend::set_alpha(&mut img, &mask);
                Ok(img)
            }
            ImageKind::SetCombine(n) => n.image.generate(opt),
            ImageKind::Packaged(n) => {
                let package = opt
                    .package
                    .ok_or_else(|| GenerateError::not_found(&n.filename))?;
                let bytes = package.resolve(&n.filename)?;
                let img = image::load_from_memory(&bytes)
                    .map_err(|source| GenerateError::InvalidImageData {
                        name: n.filename.clone(),
                        source,
                    })?
                    .to_rgba8();
                tracing::trace!(filename = %n.filename, width = img.width(), height = img.height(), "decoded");
                finish_leaf(img, opt)
            }
            ImageKind::BuiltIn(n) => finish_leaf(builtin::load_built_in(&n.name)?, opt),
            ImageKind::Symbol(n) => {
                let img = opt
                    .rasterizer
                    .rasterize(opt.symbol_package, &n.filename, &n.variation)?;
                finish_leaf(img, opt)
            }
        }
    }
}

/// Sizes and color-adjusts content loaded by a leaf.
fn finish_leaf(img: RgbaImage, opt: &Options) -> GenerateResult<RgbaImage> {
    let mut img = conform_image(img, opt)?;
    if opt.saturate {
        saturate_image(&mut img, SATURATE_AMOUNT);
    }
    Ok(img)
}

impl GeneratedImage {
    /// Structural comparison that visits each pair of shared children once.
    fn eq_with(&self, other: &Self, seen: &mut SeenPairs) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.hash != other.hash {
            return false;
        }
        let pair: (*const Self, *const Self) = (self, other);
        if seen.contains(&pair) {
            return true;
        }
        let equal = self.kind.eq_with(&other.kind, seen);
        if equal && !self.kind.is_leaf() {
            seen.insert(pair);
        }
        equal
    }
}

impl PartialEq for GeneratedImage {
    fn eq(&self, other: &Self) -> bool {
        self.eq_with(other, &mut SeenPairs::new())
    }
}

impl Eq for GeneratedImage {}

impl Hash for GeneratedImage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
