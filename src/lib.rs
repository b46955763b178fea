//! card-imagegen: image generation for card artwork
//!
//! A card's artwork is described by a tree of [`GeneratedImage`] nodes:
//! leaves load pixels from a package, the built-in table or a symbol file,
//! and combinators blend, mask and recombine their children. Calling
//! [`GeneratedImage::generate`] evaluates the tree into a single RGBA raster.
//!
//! # Example
//!
//! ```
//! use card_imagegen::{GeneratedImage, ImageCombine, Options};
//!
//! let node = GeneratedImage::set_combine(
//!     GeneratedImage::masked_blend(
//!         GeneratedImage::built_in("bool_yes"),
//!         GeneratedImage::built_in("bool_no"),
//!         GeneratedImage::built_in("sort_asc"),
//!     ),
//!     ImageCombine::Multiply,
//! );
//!
//! let img = node.generate(&Options::new(48, 48)).unwrap();
//! assert_eq!(img.dimensions(), (48, 48));
//! assert_eq!(node.combine(), ImageCombine::Multiply);
//! ```
//!
//! # Equality and caching
//!
//! Nodes compare structurally, so two trees built separately from the same
//! description are equal and hash alike. [`GenerationCache`] and
//! [`ImageRenderer`] use this to skip regenerating unchanged artwork.
//!
//! # Serializable descriptions
//!
//! Trees can be read from and written to JSON with [`ImageDescription`]:
//!
//! ```
//! use card_imagegen::ImageDescription;
//!
//! let desc = ImageDescription::from_json(
//!     r#"{ "type": "built_in", "name": "blank" }"#,
//! ).unwrap();
//! let node = desc.build();
//! assert_eq!(node.describe(), desc);
//! ```

mod cache;
mod combine;
mod description;
mod error;
mod node;
mod options;
mod package;
mod renderer;
mod symbol;

pub use cache::{CacheKey, GenerationCache};
pub use combine::{ImageCombine, combine_over};
pub use description::ImageDescription;
pub use error::{GenerateError, GenerateResult};
pub use node::builtin::{built_in_names, is_built_in};
pub use node::{
    BuiltInImage, CombineBlendImage, GeneratedImage, GeneratedImageRef, ImageKind,
    LinearBlendImage, MaskedBlendImage, PackagedImage, SetCombineImage, SetMaskImage,
    SymbolToImage,
};
pub use options::{Options, PreserveAspect, RenderSettings};
pub use package::{DirPackage, MemoryPackage, Package, PackageManager, Packaged, normalize_name};
pub use renderer::{Configurable, ImageRenderer};
pub use symbol::{
    Age, DEFAULT_SYMBOL_SIZE, SvgSymbolRasterizer, SymbolFilter, SymbolRasterizer,
    SymbolVariation,
};

// Re-export image types for convenience
pub use image::{Rgba, RgbaImage};
