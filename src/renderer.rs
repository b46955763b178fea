//! Rendering facade: settings, packages and a shared generation cache.

use std::sync::Arc;

use image::RgbaImage;
use rayon::prelude::*;

use crate::cache::GenerationCache;
use crate::error::GenerateResult;
use crate::node::GeneratedImageRef;
use crate::options::{Options, RenderSettings};
use crate::package::Package;
use crate::symbol::SvgSymbolRasterizer;

// ============================================================================
// Configurable Trait
// ============================================================================

/// Trait for types that can be configured from [`RenderSettings`].
pub trait Configurable {
    /// Applies the settings to this instance.
    fn apply_settings(&mut self, settings: &RenderSettings);

    /// Exports the current settings.
    fn export_settings(&self) -> RenderSettings;
}

// ============================================================================
// ImageRenderer
// ============================================================================

/// Renders node trees against a fixed pair of packages.
///
/// Results are memoized in a [`GenerationCache`]. Replacing a package clears
/// the cache; changing settings does not, since the size options are part of
/// every cache key. The cache is unbounded and holds one raster per distinct
/// tree and size for the renderer's lifetime, unless bounded with
/// [`with_cache_capacity`](Self::with_cache_capacity).
///
/// # Example
///
/// ```
/// use card_imagegen::{Configurable, GeneratedImage, ImageRenderer, RenderSettings};
///
/// let mut renderer = ImageRenderer::new();
/// renderer.apply_settings(&RenderSettings { width: 32, height: 32, ..Default::default() });
///
/// let node = GeneratedImage::built_in("bool_yes");
/// let img = renderer.render(&node).unwrap();
/// assert_eq!(img.dimensions(), (32, 32));
/// ```
pub struct ImageRenderer {
    settings: RenderSettings,
    package: Option<Arc<dyn Package>>,
    symbol_package: Option<Arc<dyn Package>>,
    rasterizer: SvgSymbolRasterizer,
    cache: GenerationCache,
}

impl Default for ImageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageRenderer {
    /// Creates a renderer with default settings and no packages.
    pub fn new() -> Self {
        Self {
            settings: RenderSettings::default(),
            package: None,
            symbol_package: None,
            rasterizer: SvgSymbolRasterizer::default(),
            cache: GenerationCache::new(),
        }
    }

    pub fn with_package(mut self, package: Arc<dyn Package>) -> Self {
        self.set_package(Some(package));
        self
    }

    pub fn with_symbol_package(mut self, package: Arc<dyn Package>) -> Self {
        self.set_symbol_package(Some(package));
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: SvgSymbolRasterizer) -> Self {
        self.rasterizer = rasterizer;
        self.cache.invalidate_all();
        self
    }

    /// Keeps at most `capacity` rendered rasters, evicting the oldest.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = GenerationCache::with_capacity(capacity);
        self
    }

    /// Replaces the image package and clears the cache.
    pub fn set_package(&mut self, package: Option<Arc<dyn Package>>) {
        self.package = package;
        self.cache.invalidate_all();
    }

    /// Replaces the symbol package and clears the cache.
    pub fn set_symbol_package(&mut self, package: Option<Arc<dyn Package>>) {
        self.symbol_package = package;
        self.cache.invalidate_all();
    }

    pub fn cache(&self) -> &GenerationCache {
        &self.cache
    }

    /// Options for the current settings and packages.
    pub fn options(&self) -> Options<'_> {
        self.settings
            .options(self.package.as_deref(), self.symbol_package.as_deref())
            .with_rasterizer(&self.rasterizer)
    }

    /// Renders one tree with the current settings.
    pub fn render(&self, node: &GeneratedImageRef) -> GenerateResult<RgbaImage> {
        self.cache.get_or_generate(node, &self.options())
    }

    /// Renders independent trees in parallel.
    ///
    /// Results come back in input order; one failure does not stop the rest.
    pub fn render_many(&self, nodes: &[GeneratedImageRef]) -> Vec<GenerateResult<RgbaImage>> {
        let opt = self.options();
        tracing::debug!(count = nodes.len(), "rendering batch");
        nodes
            .par_iter()
            .map(|node| self.cache.get_or_generate(node, &opt))
            .collect()
    }

    /// Clears the generation cache. Useful for freeing memory.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }
}

impl Configurable for ImageRenderer {
    fn apply_settings(&mut self, settings: &RenderSettings) {
        self.settings = *settings;
    }

    fn export_settings(&self) -> RenderSettings {
        self.settings
    }
}

impl std::fmt::Debug for ImageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRenderer")
            .field("settings", &self.settings)
            .field("package", &self.package.as_ref().map(|p| p.name().to_string()))
            .field(
                "symbol_package",
                &self.symbol_package.as_ref().map(|p| p.name().to_string()),
            )
            .field("cache", &self.cache)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::ImageCombine;
    use crate::error::GenerateError;
    use crate::node::GeneratedImage;
    use crate::options::PreserveAspect;
    use crate::package::MemoryPackage;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        let mut buf = Vec::new();
        RgbaImage::from_pixel(w, h, Rgba(px))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn renderer() -> ImageRenderer {
        let pkg = MemoryPackage::named("magic.mse-style")
            .with_file("card.png", png(10, 14, [30, 60, 90, 255]))
            .with_file("frame.png", png(10, 14, [255, 255, 255, 255]));
        ImageRenderer::new().with_package(Arc::new(pkg))
    }

    #[test]
    fn render_uses_settings() {
        let mut r = renderer();
        let node = GeneratedImage::packaged("card.png");
        assert_eq!(r.render(&node).unwrap().dimensions(), (10, 14));

        r.apply_settings(&RenderSettings {
            width: 20,
            height: 20,
            preserve_aspect: PreserveAspect::FitLetterbox,
            saturate: false,
        });
        let img = r.render(&node).unwrap();
        assert_eq!(img.dimensions(), (20, 20));
        assert_eq!(img.get_pixel(0, 10).0[3], 0);
    }

    #[test]
    fn repeated_render_hits_cache() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();

        let r = renderer();
        let node = GeneratedImage::combine_blend(
            GeneratedImage::packaged("card.png"),
            GeneratedImage::packaged("frame.png"),
            ImageCombine::Multiply,
        );
        let first = r.render(&node).unwrap();
        let second = r.render(&node).unwrap();
        assert_eq!(first, second);
        assert_eq!(r.cache().hits(), 1);
        assert_eq!(r.cache().misses(), 1);
    }

    #[test]
    fn replacing_package_clears_cache() {
        let mut r = renderer();
        let node = GeneratedImage::packaged("card.png");
        r.render(&node).unwrap();
        assert_eq!(r.cache().len(), 1);

        r.set_package(Some(Arc::new(MemoryPackage::new())));
        assert!(r.cache().is_empty());
        assert!(matches!(
            r.render(&node),
            Err(GenerateError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn render_many_keeps_order_and_isolates_failures() {
        let r = renderer();
        let nodes = vec![
            GeneratedImage::packaged("card.png"),
            GeneratedImage::packaged("nope.png"),
            GeneratedImage::built_in("blank"),
        ];
        let results = r.render_many(&nodes);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().dimensions(), (10, 14));
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().dimensions(), (1, 1));
    }

    #[test]
    fn cache_capacity_bounds_retained_rasters() {
        let r = renderer().with_cache_capacity(1);
        assert_eq!(r.cache().capacity(), Some(1));

        let card = GeneratedImage::packaged("card.png");
        let frame = GeneratedImage::packaged("frame.png");
        r.render(&card).unwrap();
        r.render(&frame).unwrap();
        assert_eq!(r.cache().len(), 1);

        r.render(&card).unwrap();
        assert_eq!(r.cache().hits(), 0);
        assert_eq!(r.cache().misses(), 3);
    }

    #[test]
    fn settings_roundtrip_through_configurable() {
        let mut r = ImageRenderer::new();
        let settings = RenderSettings {
            width: 375,
            height: 523,
            preserve_aspect: PreserveAspect::FitCrop,
            saturate: true,
        };
        r.apply_settings(&settings);
        assert_eq!(r.export_settings(), settings);

        let json = r.export_settings().to_json().unwrap();
        let mut other = ImageRenderer::new();
        other.apply_settings(&RenderSettings::from_json(&json).unwrap());
        assert_eq!(other.export_settings(), settings);
    }
}
