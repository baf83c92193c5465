use std::path::PathBuf;

use arrow_schema::{ArrowError, DataType};
use etymon_core::{CharsetError, DatasetError, NormalizeError};
use thiserror::Error;

/// Errors raised while saving or loading dataset partitions.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported character set `{provided}`; only \"GB2312\" and \"GBK\" are accepted")]
    UnsupportedCharset { provided: String },
    #[error("no `{namespace}` partition at `{path}`")]
    MissingPartition { namespace: String, path: PathBuf },
    #[error("more than one dataset supplied for the `{namespace}` partition")]
    DuplicatePartition { namespace: String },
    #[error("column `{column}` not found in Parquet schema")]
    ColumnNotFound { column: String },
    #[error("column `{column}` has type {actual:?}, expected {expected}")]
    InvalidColumnType {
        column: String,
        expected: &'static str,
        actual: DataType,
    },
    #[error("column `{column}` must not be nullable")]
    NullableField { column: String },
    #[error("invalid FixedSizeList dimension {actual}")]
    InvalidDimension { actual: i32 },
    #[error("feature rows have {actual} values but the {width}x{height} geometry requires {expected}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("partition metadata lacks `{key}`")]
    MissingGeometry { key: &'static str },
    #[error("partition metadata `{key}` has non-numeric value `{value}`")]
    InvalidGeometry { key: &'static str, value: String },
    #[error("column `{column}` row {row} is null")]
    NullRow { column: String, row: usize },
    #[error("feature row {row} contains null value at position {value_index}")]
    NullValue { row: usize, value_index: usize },
    #[error("feature row {row} value {value_index} is {value}, expected 0 or 1")]
    NonBinaryValue {
        row: usize,
        value_index: usize,
        value: f32,
    },
    #[error("row {row} holds an undecodable glyph")]
    InvalidGlyph {
        row: usize,
        #[source]
        source: CharsetError,
    },
    #[error("row {row} holds unknown category `{value}`")]
    InvalidCategory { row: usize, value: String },
    #[error("{rows} rows exceed the capacity of a single partition")]
    CapacityOverflow { rows: usize },
    #[error(transparent)]
    Charset(#[from] CharsetError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("failed to access `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
