//! Serializable description of a node tree.
//!
//! An [`ImageDescription`] mirrors [`GeneratedImage`] in a JSON-friendly form,
//! so trees can be stored, sent between processes or written by hand.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "type": "set_combine",
//!   "mode": "screen",
//!   "image": {
//!     "type": "masked_blend",
//!     "light": { "type": "packaged", "filename": "card-light.png" },
//!     "dark": { "type": "packaged", "filename": "card-dark.png" },
//!     "mask": { "type": "built_in", "name": "blank" }
//!   }
//! }
//! ```
//!
//! Building a description never fails; bad filenames or built-in names
//! surface when the tree is generated.

use serde::{Deserialize, Serialize};

use crate::combine::ImageCombine;
use crate::node::{GeneratedImage, GeneratedImageRef, ImageKind};
use crate::symbol::{Age, SymbolVariation};

/// JSON description of a [`GeneratedImage`] tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageDescription {
    LinearBlend {
        a: Box<ImageDescription>,
        b: Box<ImageDescription>,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    MaskedBlend {
        light: Box<ImageDescription>,
        dark: Box<ImageDescription>,
        mask: Box<ImageDescription>,
    },
    CombineBlend {
        a: Box<ImageDescription>,
        b: Box<ImageDescription>,
        #[serde(default)]
        mode: ImageCombine,
    },
    SetMask {
        image: Box<ImageDescription>,
        mask: Box<ImageDescription>,
    },
    SetCombine {
        image: Box<ImageDescription>,
        mode: ImageCombine,
    },
    Packaged {
        filename: String,
    },
    BuiltIn {
        name: String,
    },
    Symbol {
        filename: String,
        #[serde(default)]
        age: Age,
        #[serde(default)]
        variation: SymbolVariation,
    },
}

impl ImageDescription {
    /// Builds the node tree this description stands for.
    pub fn build(&self) -> GeneratedImageRef {
        match self {
            Self::LinearBlend { a, b, x1, y1, x2, y2 } => {
                GeneratedImage::linear_blend(a.build(), b.build(), *x1, *y1, *x2, *y2)
            }
            Self::MaskedBlend { light, dark, mask } => {
                GeneratedImage::masked_blend(light.build(), dark.build(), mask.build())
            }
            Self::CombineBlend { a, b, mode } => {
                GeneratedImage::combine_blend(a.build(), b.build(), *mode)
            }
            Self::SetMask { image, mask } => GeneratedImage::set_mask(image.build(), mask.build()),
            Self::SetCombine { image, mode } => GeneratedImage::set_combine(image.build(), *mode),
            Self::Packaged { filename } => GeneratedImage::packaged(filename.as_str()),
            Self::BuiltIn { name } => GeneratedImage::built_in(name.as_str()),
            Self::Symbol {
                filename,
                age,
                variation,
            } => GeneratedImage::symbol(filename.as_str(), *age, variation.clone()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl GeneratedImage {
    /// Describes this tree. Shared children are written out once per use.
    pub fn describe(&self) -> ImageDescription {
        let boxed = |n: &GeneratedImageRef| Box::new(n.describe());
        match self.kind() {
            ImageKind::LinearBlend(n) => ImageDescription::LinearBlend {
                a: boxed(&n.a),
                b: boxed(&n.b),
                x1: n.x1,
                y1: n.y1,
                x2: n.x2,
                y2: n.y2,
            },
            ImageKind::MaskedBlend(n) => ImageDescription::MaskedBlend {
                light: boxed(&n.light),
                dark: boxed(&n.dark),
                mask: boxed(&n.mask),
            },
            ImageKind::CombineBlend(n) => ImageDescription::CombineBlend {
                a: boxed(&n.a),
                b: boxed(&n.b),
                mode: n.mode,
            },
            ImageKind::SetMask(n) => ImageDescription::SetMask {
                image: boxed(&n.image),
                mask: boxed(&n.mask),
            },
            ImageKind::SetCombine(n) => ImageDescription::SetCombine {
                image: boxed(&n.image),
                mode: n.mode,
            },
            ImageKind::Packaged(n) => ImageDescription::Packaged {
                filename: n.filename.clone(),
            },
            ImageKind::BuiltIn(n) => ImageDescription::BuiltIn {
                name: n.name.clone(),
            },
            ImageKind::Symbol(n) => ImageDescription::Symbol {
                filename: n.filename.clone(),
                age: n.age,
                variation: n.variation.clone(),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"{
        "type": "set_combine",
        "mode": "screen",
        "image": {
            "type": "masked_blend",
            "light": { "type": "packaged", "filename": "card-light.png" },
            "dark": {
                "type": "linear_blend",
                "a": { "type": "packaged", "filename": "a.png" },
                "b": { "type": "built_in", "name": "blank" },
                "x1": 0.0, "y1": 0.0, "x2": 1.0, "y2": 0.5
            },
            "mask": {
                "type": "symbol",
                "filename": "set.svg",
                "age": 3,
                "variation": { "name": "rare", "filter": "solid", "fill": [200, 160, 0], "border": [0, 0, 0] }
            }
        }
    }"#;

    #[test]
    fn parses_and_builds() {
        let desc = ImageDescription::from_json(CARD).unwrap();
        let node = desc.build();
        assert_eq!(node.combine(), ImageCombine::Screen);
        assert_eq!(node.node_count(), 7);

        let expected = GeneratedImage::set_combine(
            GeneratedImage::masked_blend(
                GeneratedImage::packaged("card-light.png"),
                GeneratedImage::linear_blend(
                    GeneratedImage::packaged("a.png"),
                    GeneratedImage::built_in("blank"),
                    0.0,
                    0.0,
                    1.0,
                    0.5,
                ),
                GeneratedImage::symbol(
                    "set.svg",
                    Age(3),
                    SymbolVariation::solid("rare", [200, 160, 0], [0, 0, 0]),
                ),
            ),
            ImageCombine::Screen,
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn describe_roundtrips_structurally() {
        let node = ImageDescription::from_json(CARD).unwrap().build();
        let json = node.describe().to_json().unwrap();
        let rebuilt = ImageDescription::from_json(&json).unwrap().build();
        assert_eq!(node, rebuilt);
        assert_eq!(node.structural_hash(), rebuilt.structural_hash());
    }

    #[test]
    fn optional_fields_default() {
        let desc = ImageDescription::from_json(
            r#"{ "type": "combine_blend",
                 "a": { "type": "packaged", "filename": "a.png" },
                 "b": { "type": "symbol", "filename": "s.svg" } }"#,
        )
        .unwrap();
        let node = desc.build();
        assert_eq!(node.combine(), ImageCombine::Normal);
        assert_eq!(
            node,
            GeneratedImage::combine_blend(
                GeneratedImage::packaged("a.png"),
                GeneratedImage::symbol("s.svg", Age(0), SymbolVariation::default()),
                ImageCombine::Normal,
            )
        );
    }

    #[test]
    fn rejects_unknown_types_and_modes() {
        assert!(ImageDescription::from_json(r#"{ "type": "sepia" }"#).is_err());
        assert!(
            ImageDescription::from_json(
                r#"{ "type": "set_combine", "mode": "sparkle",
                     "image": { "type": "built_in", "name": "blank" } }"#
            )
            .is_err()
        );
    }

    #[test]
    fn json_uses_snake_case_tags() {
        let json = GeneratedImage::built_in("bool_yes").describe().to_json().unwrap();
        assert_eq!(json, r#"{"type":"built_in","name":"bool_yes"}"#);
    }
}
