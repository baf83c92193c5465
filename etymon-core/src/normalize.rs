//! Glyph image normalization.
//!
//! Turns an arbitrary decoded image into a fixed-length binary feature vector:
//! luminance conversion, white-margin removal, resize to a canonical square,
//! threshold binarization, and row-major flattening. Every stage is
//! deterministic so the same source file always yields the same vector.

use std::num::NonZeroU32;

use image::{DynamicImage, GrayImage, Luma, imageops, imageops::FilterType};

use crate::error::NormalizeError;

/// Luminance of a background pixel.
const WHITE: u8 = 255;
/// Highest intensity that binarizes to 0.
const THRESHOLD: u8 = 127;
/// Side length of the default square geometry.
const DEFAULT_SIDE: NonZeroU32 = match NonZeroU32::new(64) {
    Some(side) => side,
    None => NonZeroU32::MIN,
};

/// Canonical width and height of a normalized glyph.
///
/// # Examples
/// ```
/// use etymon_core::Geometry;
///
/// let geometry = Geometry::new(32, 16).expect("positive geometry");
/// assert_eq!(geometry.dimension(), 512);
/// assert!(Geometry::new(0, 16).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Geometry {
    width: NonZeroU32,
    height: NonZeroU32,
}

impl Geometry {
    /// The 64×64 geometry used unless a caller overrides it.
    pub const DEFAULT: Self = Self {
        width: DEFAULT_SIDE,
        height: DEFAULT_SIDE,
    };

    /// Creates a geometry after checking both sides are positive.
    ///
    /// # Errors
    /// Returns [`NormalizeError::ZeroGeometry`] if either side is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, NormalizeError> {
        match (NonZeroU32::new(width), NonZeroU32::new(height)) {
            (Some(width), Some(height)) => Ok(Self { width, height }),
            _ => Err(NormalizeError::ZeroGeometry { width, height }),
        }
    }

    /// Output width in pixels.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.width.get()
    }

    /// Output height in pixels.
    #[must_use]
    pub const fn height(self) -> u32 {
        self.height.get()
    }

    /// Length of a feature vector with this geometry, `width * height`.
    #[must_use]
    pub fn dimension(self) -> usize {
        let width = usize::try_from(self.width()).unwrap_or(usize::MAX);
        let height = usize::try_from(self.height()).unwrap_or(usize::MAX);
        width.saturating_mul(height)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Flattened row-major glyph whose values are all 0 or 1.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    /// Wraps `values` after checking they match `geometry` and are binary.
    ///
    /// # Errors
    /// Returns [`NormalizeError::InvalidFeatureLength`] on a length mismatch
    /// and [`NormalizeError::NonBinaryValue`] on the first value above 1.
    pub fn try_new(values: Vec<u8>, geometry: Geometry) -> Result<Self, NormalizeError> {
        if values.len() != geometry.dimension() {
            return Err(NormalizeError::InvalidFeatureLength {
                expected: geometry.dimension(),
                actual: values.len(),
            });
        }
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| **v > 1) {
            return Err(NormalizeError::NonBinaryValue { index, value });
        }
        Ok(Self(values))
    }

    /// Borrow the raw 0/1 values.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Number of values, always `width * height` of the producing geometry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the vector holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the vector, returning the raw values.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

/// Pixel bounds of the non-white content of an image.
///
/// `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarginBounds {
    /// First column containing a non-white pixel.
    pub left: u32,
    /// First row containing a non-white pixel.
    pub top: u32,
    /// One past the last column containing a non-white pixel.
    pub right: u32,
    /// One past the last row containing a non-white pixel.
    pub bottom: u32,
}

impl MarginBounds {
    /// Width of the bounded region.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.right - self.left
    }

    /// Height of the bounded region.
    #[must_use]
    pub const fn height(self) -> u32 {
        self.bottom - self.top
    }
}

/// Normalizes a decoded image into a binary feature vector.
///
/// # Errors
/// Returns [`NormalizeError::EmptyImage`] when the image has no non-white
/// pixel.
///
/// # Examples
/// ```
/// use etymon_core::{Geometry, normalize};
/// use image::{DynamicImage, GrayImage, Luma};
///
/// let glyph = GrayImage::from_fn(10, 20, |x, _| Luma([if x < 5 { 0 } else { 200 }]));
/// let geometry = Geometry::new(8, 8).expect("positive geometry");
/// let features = normalize(&DynamicImage::ImageLuma8(glyph), geometry).expect("has ink");
/// assert_eq!(features.len(), 64);
/// assert_eq!(features.as_slice()[0], 0);
/// assert_eq!(features.as_slice()[7], 1);
/// ```
pub fn normalize(image: &DynamicImage, geometry: Geometry) -> Result<FeatureVector, NormalizeError> {
    let cropped = remove_margin(&to_luma(image))?;
    let resized = imageops::resize(
        &cropped,
        geometry.width(),
        geometry.height(),
        FilterType::Triangle,
    );
    let values = resized
        .into_raw()
        .into_iter()
        .map(|intensity| u8::from(intensity > THRESHOLD))
        .collect();
    Ok(FeatureVector(values))
}

/// Converts an image to a single 8-bit luminance channel.
///
/// Colour images are weighted `0.299 R + 0.587 G + 0.114 B`; any alpha
/// channel is ignored. Grey images keep their intensity.
#[must_use]
pub fn to_luma(image: &DynamicImage) -> GrayImage {
    if !image.color().has_color() {
        return image.to_luma8();
    }
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([weighted_luma(r, g, b)])
    })
}

fn weighted_luma(r: u8, g: u8, b: u8) -> u8 {
    let luma = 0.299_f32 * f32::from(r) + 0.587_f32 * f32::from(g) + 0.114_f32 * f32::from(b);
    luma.round().clamp(0.0, f32::from(WHITE)) as u8
}

/// Locates the bounding box of all non-white pixels.
///
/// Returns `None` for an image with no non-white pixel.
#[must_use]
pub fn margin_bounds(gray: &GrayImage) -> Option<MarginBounds> {
    let (width, height) = gray.dimensions();
    let row_has_ink = |y: u32| (0..width).any(|x| gray.get_pixel(x, y).0[0] != WHITE);
    let column_has_ink = |x: u32| (0..height).any(|y| gray.get_pixel(x, y).0[0] != WHITE);

    let top = (0..height).find(|&y| row_has_ink(y))?;
    let bottom = (0..height).rev().find(|&y| row_has_ink(y))? + 1;
    let left = (0..width).find(|&x| column_has_ink(x))?;
    let right = (0..width).rev().find(|&x| column_has_ink(x))? + 1;
    Some(MarginBounds {
        left,
        top,
        right,
        bottom,
    })
}

/// Crops an image to the bounding box of its non-white pixels.
///
/// # Errors
/// Returns [`NormalizeError::EmptyImage`] when the image is entirely white.
pub fn remove_margin(gray: &GrayImage) -> Result<GrayImage, NormalizeError> {
    let bounds = margin_bounds(gray).ok_or(NormalizeError::EmptyImage {
        width: gray.width(),
        height: gray.height(),
    })?;
    Ok(imageops::crop_imm(gray, bounds.left, bounds.top, bounds.width(), bounds.height()).to_image())
}
