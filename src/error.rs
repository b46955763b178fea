//! Error types shared by every generation step.

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Failure raised while generating an image or opening a package.
///
/// Mismatched child sizes are never an error: combinators resample instead.
#[derive(thiserror::Error, Debug)]
pub enum GenerateError {
    /// A named resource is absent from the package (or no package was supplied).
    #[error("resource not found: {name}")]
    ResourceNotFound { name: String },

    /// Bytes were found but could not be decoded as an image.
    #[error("invalid image data in '{name}': {source}")]
    InvalidImageData {
        name: String,
        #[source]
        source: image::ImageError,
    },

    /// The built-in resource table has no entry with this name.
    #[error("unknown built-in image: {0}")]
    UnknownBuiltIn(String),

    /// The symbol rasterizer failed.
    #[error("failed to render symbol '{filename}': {message}")]
    SymbolRender { filename: String, message: String },

    /// A package could not be opened from disk.
    #[error("failed to open package '{}': {source}", path.display())]
    PackageOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requested output size is larger than any raster the generator allocates.
    #[error("requested image size {width}x{height} is too large")]
    ImageTooLarge { width: u32, height: u32 },

    /// A combine mode name was not recognised.
    #[error("unknown combine mode: {0}")]
    UnknownCombine(String),
}

impl GenerateError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::ResourceNotFound { name: name.into() }
    }

    /// Wraps an SVG parse failure as undecodable image data.
    pub fn invalid_svg(name: impl Into<String>, message: impl Into<String>) -> Self {
        use image::error::{DecodingError, ImageFormatHint};

        let message: String = message.into();
        Self::InvalidImageData {
            name: name.into(),
            source: image::ImageError::Decoding(DecodingError::new(
                ImageFormatHint::Name("svg".to_string()),
                message,
            )),
        }
    }

    pub fn symbol(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SymbolRender {
            filename: filename.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_resource() {
        let err = GenerateError::not_found("foo.png");
        assert_eq!(err.to_string(), "resource not found: foo.png");

        let err = GenerateError::UnknownBuiltIn("nope".into());
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn package_open_preserves_source() {
        use std::error::Error;

        let err = GenerateError::PackageOpen {
            path: PathBuf::from("/data/magic.mse-game"),
            source: std::io::Error::other("boom"),
        };
        assert!(err.to_string().contains("magic.mse-game"));
        assert!(err.source().unwrap().to_string().contains("boom"));
    }
}
