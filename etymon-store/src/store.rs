//! Directory of Parquet partitions, one per character-set namespace.
use std::{
    collections::HashMap,
    ffi::OsString,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow_array::{
    ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, builder::FixedSizeBinaryBuilder,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use etymon_core::{Category, CharacterSet, CharsetError, Dataset, FeatureVector, Geometry, Sample};
use parquet::{
    arrow::{ArrowWriter, arrow_reader::ParquetRecordBatchReaderBuilder},
    file::reader::ChunkReader,
};
use tracing::{info, instrument};

use crate::{
    errors::StoreError,
    ingest::{
        append_binary_rows, as_fixed_size_binary, as_fixed_size_list,
        validate_fixed_size_binary_field, validate_fixed_size_list_field,
    },
};

/// Column holding each sample's glyph in the namespace's own encoding.
pub const CHARACTERS: &str = "Characters";
/// Column holding each sample's NUL-padded UTF-8 category name.
pub const CATEGORIES: &str = "Categories";
/// Column holding each sample's feature row.
pub const FEATURE_MATRIX: &str = "FeatureMatrix";
/// Metadata key for the normalized image width.
pub const IMAGE_WIDTH: &str = "ImageWidth";
/// Metadata key for the normalized image height.
pub const IMAGE_HEIGHT: &str = "ImageHeight";

const PARTITION_EXTENSION: &str = "parquet";

/// A dataset store: a directory holding one `<NAMESPACE>.parquet` partition
/// per character set.
///
/// Each partition is written and read independently, so adding the `GBK`
/// partition leaves an existing `GB2312` partition untouched.
///
/// # Examples
/// ```
/// use etymon_core::{CharacterSet, Dataset, Geometry};
/// use etymon_store::DatasetStore;
///
/// let dir = tempfile::tempdir().expect("temporary directory");
/// let store = DatasetStore::new(dir.path());
/// let dataset = Dataset::new(CharacterSet::Gbk, Geometry::DEFAULT);
/// store.save_partition(&dataset).expect("empty partitions are valid");
/// assert_eq!(store.partitions().expect("listing succeeds"), vec![CharacterSet::Gbk]);
/// assert!(store.load("gbk").expect("partition exists").is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct DatasetStore {
    root: PathBuf,
}

impl DatasetStore {
    /// Opens a store rooted at `root`; the directory is created on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the partitions.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing the `charset` partition.
    #[must_use]
    pub fn partition_path(&self, charset: CharacterSet) -> PathBuf {
        self.root
            .join(charset.namespace())
            .with_extension(PARTITION_EXTENSION)
    }

    /// Character sets that currently have a partition on disk.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the store directory exists but cannot be
    /// inspected.
    pub fn partitions(&self) -> Result<Vec<CharacterSet>, StoreError> {
        let mut present = Vec::new();
        for charset in CharacterSet::ALL {
            let path = self.partition_path(charset);
            if path.try_exists().map_err(StoreError::io(&path))? {
                present.push(charset);
            }
        }
        Ok(present)
    }

    /// Writes every dataset to its namespace's partition.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicatePartition`] if two datasets share a
    /// character set, or any error from [`DatasetStore::save_partition`].
    pub fn save<'a>(
        &self,
        datasets: impl IntoIterator<Item = &'a Dataset>,
    ) -> Result<Vec<PathBuf>, StoreError> {
        let datasets: Vec<&Dataset> = datasets.into_iter().collect();
        for (index, dataset) in datasets.iter().enumerate() {
            if datasets[..index]
                .iter()
                .any(|earlier| earlier.charset() == dataset.charset())
            {
                return Err(StoreError::DuplicatePartition {
                    namespace: dataset.charset().namespace().to_owned(),
                });
            }
        }
        datasets
            .into_iter()
            .map(|dataset| self.save_partition(dataset))
            .collect()
    }

    /// Writes `dataset` to its namespace's partition, replacing any previous
    /// contents atomically.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on filesystem failures and Arrow or Parquet
    /// errors if the partition cannot be encoded.
    #[instrument(
        name = "store.save",
        err,
        skip_all,
        fields(namespace = dataset.charset().namespace(), rows = dataset.len()),
    )]
    pub fn save_partition(&self, dataset: &Dataset) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.root).map_err(StoreError::io(&self.root))?;
        let path = self.partition_path(dataset.charset());
        let part = part_path(&path);
        let file = File::create(&part).map_err(StoreError::io(&part))?;
        write_dataset(file, dataset)?;
        fs::rename(&part, &path).map_err(StoreError::io(&path))?;
        info!(path = %path.display(), "partition written");
        Ok(path)
    }

    /// Loads the partition named by `charset`, matched case-insensitively.
    ///
    /// # Errors
    /// Returns [`StoreError::UnsupportedCharset`] for unknown names,
    /// [`StoreError::MissingPartition`] when the partition was never written,
    /// and validation errors from [`read_dataset`].
    #[instrument(name = "store.load", err, skip(self), fields(root = %self.root.display()))]
    pub fn load(&self, charset: &str) -> Result<Dataset, StoreError> {
        let charset: CharacterSet = charset.parse().map_err(|err| match err {
            CharsetError::Unsupported { provided } => StoreError::UnsupportedCharset { provided },
            other => StoreError::Charset(other),
        })?;
        let path = self.partition_path(charset);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::MissingPartition {
                    namespace: charset.namespace().to_owned(),
                    path,
                });
            }
            Err(err) => return Err(StoreError::io(&path)(err)),
        };
        let dataset = read_dataset(file, charset)?;
        info!(rows = dataset.len(), "partition loaded");
        Ok(dataset)
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Arrow schema of a partition with the given geometry.
///
/// # Errors
/// Returns [`StoreError::CapacityOverflow`] if the geometry's dimension does
/// not fit an Arrow list length.
pub fn partition_schema(charset: CharacterSet, geometry: Geometry) -> Result<SchemaRef, StoreError> {
    let dimension = list_length(geometry.dimension())?;
    let glyph_width = list_length(charset.glyph_width())?;
    let category_width = list_length(Category::MAX_NAME_LEN)?;
    let geometry_metadata = HashMap::from([
        (IMAGE_WIDTH.to_owned(), geometry.width().to_string()),
        (IMAGE_HEIGHT.to_owned(), geometry.height().to_string()),
    ]);
    Ok(Arc::new(Schema::new(vec![
        Field::new(CHARACTERS, DataType::FixedSizeBinary(glyph_width), false),
        Field::new(CATEGORIES, DataType::FixedSizeBinary(category_width), false),
        Field::new(
            FEATURE_MATRIX,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), dimension),
            false,
        )
        .with_metadata(geometry_metadata),
    ])))
}

fn list_length(length: usize) -> Result<i32, StoreError> {
    i32::try_from(length).map_err(|_| StoreError::CapacityOverflow { rows: length })
}

/// Encodes `dataset` as a single Arrow record batch.
///
/// Characters are encoded with the dataset's own character-set codec.
///
/// # Errors
/// Returns [`StoreError::Charset`] if a character cannot be encoded and
/// [`StoreError::Arrow`] if the arrays cannot be assembled.
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch, StoreError> {
    let charset = dataset.charset();
    let schema = partition_schema(charset, dataset.geometry())?;
    let rows = dataset.len();

    let mut characters = FixedSizeBinaryBuilder::with_capacity(rows, list_length(charset.glyph_width())?);
    let mut categories =
        FixedSizeBinaryBuilder::with_capacity(rows, list_length(Category::MAX_NAME_LEN)?);
    for sample in dataset.samples() {
        characters.append_value(charset.encode_char(sample.character)?)?;
        categories.append_value(padded_category(sample.category))?;
    }

    let item = Arc::new(Field::new("item", DataType::Float32, false));
    let features = FixedSizeListArray::try_new(
        item,
        list_length(dataset.geometry().dimension())?,
        Arc::new(Float32Array::from(dataset.feature_matrix())) as ArrayRef,
        None,
    )?;

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(characters.finish()) as ArrayRef,
            Arc::new(categories.finish()) as ArrayRef,
            Arc::new(features) as ArrayRef,
        ],
    )?)
}

fn padded_category(category: Category) -> [u8; Category::MAX_NAME_LEN] {
    let mut padded = [0_u8; Category::MAX_NAME_LEN];
    for (slot, byte) in padded.iter_mut().zip(category.as_str().bytes()) {
        *slot = byte;
    }
    padded
}

/// Writes `dataset` as a Parquet file to `writer`.
///
/// # Errors
/// Returns Arrow or Parquet errors if encoding fails.
pub fn write_dataset<W: Write + Send>(writer: W, dataset: &Dataset) -> Result<(), StoreError> {
    let batch = to_record_batch(dataset)?;
    let mut writer = ArrowWriter::try_new(writer, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Reads and validates a `charset` partition from any Parquet source.
///
/// Geometry is taken from the `FeatureMatrix` field metadata, falling back
/// to schema-level `ImageWidth`/`ImageHeight` entries.
///
/// # Errors
/// Returns a [`StoreError`] describing the first schema or value that does
/// not match the partition layout.
pub fn read_dataset<R>(reader: R, charset: CharacterSet) -> Result<Dataset, StoreError>
where
    R: ChunkReader + 'static,
{
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
    let schema = Arc::clone(builder.schema());
    let (characters_index, characters_field) = find_column(&schema, CHARACTERS)?;
    let (categories_index, categories_field) = find_column(&schema, CATEGORIES)?;
    let (features_index, features_field) = find_column(&schema, FEATURE_MATRIX)?;

    validate_fixed_size_binary_field(characters_field, CHARACTERS, charset.glyph_width())?;
    validate_fixed_size_binary_field(categories_field, CATEGORIES, Category::MAX_NAME_LEN)?;
    let dimension = validate_fixed_size_list_field(features_field, FEATURE_MATRIX)?;
    let geometry = read_geometry(&schema, features_field)?;
    if dimension != geometry.dimension() {
        return Err(StoreError::DimensionMismatch {
            width: geometry.width(),
            height: geometry.height(),
            expected: geometry.dimension(),
            actual: dimension,
        });
    }

    let mut samples = Vec::new();
    for batch in builder.build()? {
        let batch = batch?;
        let start_row = samples.len();
        let characters = as_fixed_size_binary(batch.column(characters_index), CHARACTERS)?;
        let categories = as_fixed_size_binary(batch.column(categories_index), CATEGORIES)?;
        let features = as_fixed_size_list(batch.column(features_index), FEATURE_MATRIX)?;
        let mut rows = Vec::with_capacity(batch.num_rows());
        append_binary_rows(features, dimension, start_row, &mut rows)?;
        for (offset, values) in rows.into_iter().enumerate() {
            let row = start_row + offset;
            let character = charset
                .decode_char(characters.value(offset))
                .map_err(|source| StoreError::InvalidGlyph { row, source })?;
            let category = parse_category(categories.value(offset), row)?;
            let features = FeatureVector::try_new(values, geometry)?;
            samples.push(Sample::new(character, category, features));
        }
    }
    Ok(Dataset::from_samples(charset, geometry, samples)?)
}

fn find_column<'a>(schema: &'a Schema, column: &str) -> Result<(usize, &'a Field), StoreError> {
    let index = schema
        .index_of(column)
        .map_err(|_| StoreError::ColumnNotFound {
            column: column.to_owned(),
        })?;
    Ok((index, schema.field(index)))
}

fn read_geometry(schema: &Schema, features: &Field) -> Result<Geometry, StoreError> {
    let lookup = |key: &'static str| -> Result<u32, StoreError> {
        let raw = features
            .metadata()
            .get(key)
            .or_else(|| schema.metadata().get(key))
            .ok_or(StoreError::MissingGeometry { key })?;
        raw.trim().parse().map_err(|_| StoreError::InvalidGeometry {
            key,
            value: raw.clone(),
        })
    };
    Ok(Geometry::new(lookup(IMAGE_WIDTH)?, lookup(IMAGE_HEIGHT)?)?)
}

fn parse_category(raw: &[u8], row: usize) -> Result<Category, StoreError> {
    let trimmed = raw.split(|&byte| byte == 0).next().unwrap_or_default();
    std::str::from_utf8(trimmed)
        .ok()
        .and_then(|name| name.parse().ok())
        .ok_or_else(|| StoreError::InvalidCategory {
            row,
            value: String::from_utf8_lossy(raw).trim_end_matches('\0').to_owned(),
        })
}
