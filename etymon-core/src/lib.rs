//! Etymon core library.
//!
//! Pure domain types for the glyph corpus: the supported two-byte character
//! sets, the script-era categories, the image normalizer that turns scanned
//! glyphs into binary feature vectors, and the dataset builder that walks a
//! crawled directory tree.

mod builder;
mod category;
mod charset;
mod dataset;
mod error;
mod normalize;

pub use crate::{
    builder::DatasetBuilder,
    category::Category,
    charset::CharacterSet,
    dataset::{Dataset, Sample},
    error::{CharsetError, DatasetError, NormalizeError, ParseCategoryError},
    normalize::{FeatureVector, Geometry, MarginBounds, margin_bounds, normalize, remove_margin, to_luma},
};
