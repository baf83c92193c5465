//! In-memory labelled glyph table.

use crate::{
    category::Category,
    charset::CharacterSet,
    error::{DatasetError, NormalizeError},
    normalize::{FeatureVector, Geometry},
};

/// One labelled glyph image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    /// Character the image depicts.
    pub character: char,
    /// Script-era variant of the image.
    pub category: Category,
    /// Normalized binary pixels.
    pub features: FeatureVector,
}

impl Sample {
    /// Bundles a labelled feature vector.
    #[must_use]
    pub fn new(character: char, category: Category, features: FeatureVector) -> Self {
        Self {
            character,
            category,
            features,
        }
    }
}

/// Ordered samples that share one character set and one image geometry.
///
/// Every sample's character is encodable under [`Dataset::charset`] and every
/// feature vector has [`Geometry::dimension`] values; [`Dataset::push`]
/// enforces both.
///
/// # Examples
/// ```
/// use etymon_core::{Category, CharacterSet, Dataset, FeatureVector, Geometry, Sample};
///
/// let geometry = Geometry::new(2, 1).expect("positive geometry");
/// let mut dataset = Dataset::new(CharacterSet::Gb2312, geometry);
/// let features = FeatureVector::try_new(vec![0, 1], geometry).expect("binary values");
/// dataset
///     .push(Sample::new('啊', Category::Seal, features))
///     .expect("glyph is in GB2312");
/// assert_eq!(dataset.feature_matrix(), vec![0.0, 1.0]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset {
    charset: CharacterSet,
    geometry: Geometry,
    samples: Vec<Sample>,
}

impl Dataset {
    /// Creates an empty dataset.
    #[must_use]
    pub fn new(charset: CharacterSet, geometry: Geometry) -> Self {
        Self {
            charset,
            geometry,
            samples: Vec::new(),
        }
    }

    /// Builds a dataset from existing samples, validating each one.
    ///
    /// # Errors
    /// Propagates the first validation failure reported by [`Dataset::push`].
    pub fn from_samples(
        charset: CharacterSet,
        geometry: Geometry,
        samples: impl IntoIterator<Item = Sample>,
    ) -> Result<Self, DatasetError> {
        let mut dataset = Self::new(charset, geometry);
        for sample in samples {
            dataset.push(sample)?;
        }
        Ok(dataset)
    }

    /// Appends a sample.
    ///
    /// # Errors
    /// Returns [`DatasetError::Normalize`] when the feature vector length does
    /// not match the geometry and [`DatasetError::Charset`] when the character
    /// cannot be encoded under the dataset's scheme.
    pub fn push(&mut self, sample: Sample) -> Result<(), DatasetError> {
        let expected = self.geometry.dimension();
        if sample.features.len() != expected {
            return Err(NormalizeError::InvalidFeatureLength {
                expected,
                actual: sample.features.len(),
            }
            .into());
        }
        self.charset.encode_char(sample.character)?;
        self.samples.push(sample);
        Ok(())
    }

    /// Character-set namespace of the dataset.
    #[must_use]
    pub fn charset(&self) -> CharacterSet {
        self.charset
    }

    /// Geometry shared by every feature vector.
    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Samples in insertion order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when the dataset holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample characters in order.
    pub fn characters(&self) -> impl ExactSizeIterator<Item = char> + '_ {
        self.samples.iter().map(|sample| sample.character)
    }

    /// Sample categories in order.
    pub fn categories(&self) -> impl ExactSizeIterator<Item = Category> + '_ {
        self.samples.iter().map(|sample| sample.category)
    }

    /// Row-major `len() x geometry().dimension()` matrix of feature values.
    #[must_use]
    pub fn feature_matrix(&self) -> Vec<f32> {
        self.samples
            .iter()
            .flat_map(|sample| sample.features.as_slice().iter().copied().map(f32::from))
            .collect()
    }

    /// Consumes the dataset, returning its samples.
    #[must_use]
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::{fixture, rstest};

    use crate::error::CharsetError;

    #[fixture]
    fn geometry() -> Geometry {
        Geometry::new(2, 2).expect("positive geometry")
    }

    fn features(values: [u8; 4], geometry: Geometry) -> FeatureVector {
        FeatureVector::try_new(values.to_vec(), geometry).expect("binary values")
    }

    #[rstest]
    fn accessors_follow_insertion_order(geometry: Geometry) {
        let dataset = Dataset::from_samples(
            CharacterSet::Gbk,
            geometry,
            [
                Sample::new('丂', Category::Oracle, features([1, 0, 0, 1], geometry)),
                Sample::new('啊', Category::Lst, features([0, 0, 1, 1], geometry)),
            ],
        )
        .expect("samples are valid");

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.characters().collect::<String>(), "丂啊");
        assert_eq!(
            dataset.categories().collect::<Vec<_>>(),
            vec![Category::Oracle, Category::Lst]
        );
        assert_eq!(
            dataset.feature_matrix(),
            vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0]
        );
    }

    #[rstest]
    fn rejects_characters_outside_the_scheme(geometry: Geometry) {
        let mut dataset = Dataset::new(CharacterSet::Gb2312, geometry);
        let err = dataset
            .push(Sample::new('丂', Category::Seal, features([0; 4], geometry)))
            .expect_err("丂 is GBK only");
        assert!(matches!(
            err,
            DatasetError::Charset(CharsetError::Unencodable { character: '丂', .. })
        ));
        assert!(dataset.is_empty());
    }

    #[rstest]
    fn rejects_mismatched_geometry(geometry: Geometry) {
        let wide = Geometry::new(4, 2).expect("positive geometry");
        let sample = Sample::new(
            '啊',
            Category::Seal,
            FeatureVector::try_new(vec![0; 8], wide).expect("binary values"),
        );
        let err = Dataset::from_samples(CharacterSet::Gb2312, geometry, [sample])
            .expect_err("8 values do not fit 2x2");
        assert!(matches!(
            err,
            DatasetError::Normalize(NormalizeError::InvalidFeatureLength {
                expected: 4,
                actual: 8
            })
        ));
    }
}
