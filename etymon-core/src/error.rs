//! Error types for the Etymon core library.

use std::path::PathBuf;

use thiserror::Error;

use crate::charset::CharacterSet;

/// Errors raised while parsing or applying a character-set codec.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CharsetError {
    /// The requested character-set name is not one of the supported schemes.
    #[error("unsupported character set `{provided}`; only \"GB2312\" and \"GBK\" are accepted")]
    Unsupported {
        /// Raw name supplied by the caller.
        provided: String,
    },
    /// The character has no two-byte encoding under the scheme.
    #[error("character `{character}` cannot be encoded as {charset}")]
    Unencodable {
        /// Scheme used for encoding.
        charset: CharacterSet,
        /// Character that failed to encode.
        character: char,
    },
    /// The bytes do not decode to a single character under the scheme.
    #[error("bytes {bytes:02x?} do not decode to a {charset} character")]
    Undecodable {
        /// Scheme used for decoding.
        charset: CharacterSet,
        /// Offending byte sequence.
        bytes: Vec<u8>,
    },
}

/// Raised when a category name is not one of the four script-era variants.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("unknown category `{provided}`; expected oracle, bronze, seal, or lst")]
pub struct ParseCategoryError {
    /// Raw name supplied by the caller.
    pub provided: String,
}

/// Errors produced by the image normalizer.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum NormalizeError {
    /// Target geometry must have positive width and height.
    #[error("image geometry must be positive (got {width}x{height})")]
    ZeroGeometry {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The image contains no non-white pixel, so no margin can be removed.
    #[error("{width}x{height} image is entirely white")]
    EmptyImage {
        /// Width of the offending image.
        width: u32,
        /// Height of the offending image.
        height: u32,
    },
    /// A feature vector did not match the geometry it claims.
    #[error("feature vector has length {actual} but geometry requires {expected}")]
    InvalidFeatureLength {
        /// `width * height` of the geometry.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
    /// A feature vector contained a value other than 0 or 1.
    #[error("feature value {value} at position {index} is not binary")]
    NonBinaryValue {
        /// Position of the offending value.
        index: usize,
        /// Offending value.
        value: u8,
    },
}

/// Errors produced while assembling a [`crate::Dataset`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Reading the crawled directory tree failed.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: std::io::Error,
    },
    /// A sample failed feature-vector validation.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    /// A sample's character is not encodable under the dataset's scheme.
    #[error(transparent)]
    Charset(#[from] CharsetError),
}
