//! Columnar persistence for glyph datasets.
//!
//! A [`DatasetStore`] keeps one Parquet partition per character-set
//! namespace. Each partition holds three columns:
//!
//! - `Characters`: `FixedSizeBinary(2)`, the glyph in its namespace's own
//!   two-byte encoding;
//! - `Categories`: `FixedSizeBinary(6)`, the NUL-padded category name;
//! - `FeatureMatrix`: `FixedSizeList<Float32, width * height>`, carrying
//!   `ImageWidth` and `ImageHeight` as field metadata.

mod errors;
mod ingest;
mod store;

pub use crate::{
    errors::StoreError,
    store::{
        CATEGORIES, CHARACTERS, DatasetStore, FEATURE_MATRIX, IMAGE_HEIGHT, IMAGE_WIDTH,
        partition_schema, read_dataset, to_record_batch, write_dataset,
    },
};
