#![expect(clippy::expect_used, reason = "tests require contextual panics")]
//! Partition round trips and layout validation.

use std::{collections::HashMap, error::Error, sync::Arc};

use arrow_array::{
    ArrayRef, FixedSizeBinaryArray, FixedSizeListArray, Float32Array, RecordBatch,
};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use etymon_core::{Category, CharacterSet, Dataset, FeatureVector, Geometry, Sample};
use etymon_store::{
    CATEGORIES, CHARACTERS, DatasetStore, FEATURE_MATRIX, IMAGE_HEIGHT, IMAGE_WIDTH, StoreError,
    read_dataset, write_dataset,
};
use parquet::arrow::ArrowWriter;
use rstest::{fixture, rstest};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

fn geometry() -> Geometry {
    Geometry::new(3, 2).expect("positive geometry")
}

fn sample(character: char, category: Category, values: [u8; 6]) -> Sample {
    Sample::new(
        character,
        category,
        FeatureVector::try_new(values.to_vec(), geometry()).expect("binary values"),
    )
}

#[fixture]
fn gb2312() -> Dataset {
    Dataset::from_samples(
        CharacterSet::Gb2312,
        geometry(),
        [
            sample('啊', Category::Oracle, [0, 1, 0, 1, 0, 1]),
            sample('座', Category::Lst, [1, 1, 1, 0, 0, 0]),
        ],
    )
    .expect("valid GB2312 samples")
}

#[fixture]
fn gbk() -> Dataset {
    Dataset::from_samples(
        CharacterSet::Gbk,
        geometry(),
        [
            sample('丂', Category::Bronze, [1, 0, 0, 0, 0, 1]),
            sample('啊', Category::Seal, [0, 0, 0, 0, 0, 0]),
        ],
    )
    .expect("valid GBK samples")
}

fn encode(batch: &RecordBatch) -> Result<Bytes, Box<dyn Error>> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(Bytes::from(buffer))
}

/// Builds a one-row partition batch by hand.
fn manual_batch(
    glyph: [u8; 2],
    category: &[u8; 6],
    values: Vec<f32>,
    field_metadata: HashMap<String, String>,
    schema_metadata: HashMap<String, String>,
) -> RecordBatch {
    let dimension = i32::try_from(values.len()).expect("dimension fits in i32");
    let item = Arc::new(Field::new("item", DataType::Float32, false));
    let schema = Schema::new(vec![
        Field::new(CHARACTERS, DataType::FixedSizeBinary(2), false),
        Field::new(CATEGORIES, DataType::FixedSizeBinary(6), false),
        Field::new(
            FEATURE_MATRIX,
            DataType::FixedSizeList(Arc::clone(&item), dimension),
            false,
        )
        .with_metadata(field_metadata),
    ])
    .with_metadata(schema_metadata);
    let characters = FixedSizeBinaryArray::try_from_iter([glyph].into_iter()).expect("glyph column");
    let categories =
        FixedSizeBinaryArray::try_from_iter([*category].into_iter()).expect("category column");
    let features = FixedSizeListArray::try_new(
        item,
        dimension,
        Arc::new(Float32Array::from(values)) as ArrayRef,
        None,
    )
    .expect("feature column");
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(characters) as ArrayRef,
            Arc::new(categories) as ArrayRef,
            Arc::new(features) as ArrayRef,
        ],
    )
    .expect("batch matches schema")
}

fn geometry_metadata(width: &str, height: &str) -> HashMap<String, String> {
    HashMap::from([
        (IMAGE_WIDTH.to_owned(), width.to_owned()),
        (IMAGE_HEIGHT.to_owned(), height.to_owned()),
    ])
}

#[rstest]
fn both_partitions_round_trip(gb2312: Dataset, gbk: Dataset) -> TestResult {
    let dir = TempDir::new()?;
    let store = DatasetStore::new(dir.path().join("glyphs"));

    store.save([&gb2312, &gbk])?;

    let loaded_gb2312 = store.load("GB2312")?;
    let loaded_gbk = store.load("gbk")?;
    assert_eq!(loaded_gb2312, gb2312);
    assert_eq!(loaded_gbk, gbk);
    assert_eq!(loaded_gbk.characters().collect::<String>(), "丂啊");
    assert_eq!(loaded_gbk.feature_matrix(), gbk.feature_matrix());
    assert_eq!(
        store.partitions()?,
        vec![CharacterSet::Gb2312, CharacterSet::Gbk]
    );
    Ok(())
}

#[rstest]
fn partitions_are_written_independently(gb2312: Dataset, gbk: Dataset) -> TestResult {
    let dir = TempDir::new()?;
    let store = DatasetStore::new(dir.path());
    store.save_partition(&gb2312)?;
    store.save_partition(&gbk)?;

    let replacement = Dataset::new(CharacterSet::Gbk, geometry());
    store.save_partition(&replacement)?;

    assert_eq!(store.load("gb2312")?, gb2312);
    assert!(store.load("gbk")?.is_empty());
    Ok(())
}

#[rstest]
fn in_memory_round_trip_preserves_glyph_encoding(gbk: Dataset) -> TestResult {
    let mut buffer = Vec::new();
    write_dataset(&mut buffer, &gbk)?;
    let loaded = read_dataset(Bytes::from(buffer), CharacterSet::Gbk)?;
    assert_eq!(loaded, gbk);
    Ok(())
}

#[rstest]
fn geometry_can_live_in_schema_metadata() -> TestResult {
    let batch = manual_batch(
        [0xB0, 0xA1],
        b"seal\0\0",
        vec![0.0, 1.0, 1.0, 0.0],
        HashMap::new(),
        geometry_metadata("2", "2"),
    );

    let dataset = read_dataset(encode(&batch)?, CharacterSet::Gb2312)?;

    assert_eq!(dataset.geometry(), Geometry::new(2, 2)?);
    assert_eq!(dataset.characters().collect::<String>(), "啊");
    assert_eq!(dataset.categories().collect::<Vec<_>>(), vec![Category::Seal]);
    assert_eq!(dataset.feature_matrix(), vec![0.0, 1.0, 1.0, 0.0]);
    Ok(())
}

#[rstest]
#[case::unknown_name("big5")]
#[case::empty("")]
fn unsupported_charsets_are_typed_errors(#[case] name: &str) {
    let dir = TempDir::new().expect("temporary directory");
    let err = DatasetStore::new(dir.path())
        .load(name)
        .expect_err("unsupported charset");
    assert!(matches!(err, StoreError::UnsupportedCharset { ref provided } if provided == name));
}

#[rstest]
fn missing_partitions_are_reported(gb2312: Dataset) -> TestResult {
    let dir = TempDir::new()?;
    let store = DatasetStore::new(dir.path());
    store.save_partition(&gb2312)?;
    let err = store.load("gbk").expect_err("GBK was never saved");
    assert!(matches!(err, StoreError::MissingPartition { ref namespace, .. } if namespace == "GBK"));
    Ok(())
}

#[rstest]
fn duplicate_namespaces_are_rejected(gbk: Dataset) {
    let dir = TempDir::new().expect("temporary directory");
    let err = DatasetStore::new(dir.path())
        .save([&gbk, &gbk])
        .expect_err("two GBK datasets");
    assert!(matches!(err, StoreError::DuplicatePartition { .. }));
}

#[rstest]
#[case::dimension_mismatch(
    [0xB0, 0xA1], *b"seal\0\0", vec![0.0, 1.0, 1.0], geometry_metadata("2", "2"), "DimensionMismatch"
)]
#[case::missing_geometry(
    [0xB0, 0xA1], *b"seal\0\0", vec![0.0, 1.0, 1.0, 0.0], HashMap::new(), "MissingGeometry"
)]
#[case::non_binary(
    [0xB0, 0xA1], *b"seal\0\0", vec![0.0, 0.5, 1.0, 0.0], geometry_metadata("2", "2"), "NonBinaryValue"
)]
#[case::bad_glyph(
    [0x81, 0x40], *b"seal\0\0", vec![0.0, 1.0, 1.0, 0.0], geometry_metadata("2", "2"), "InvalidGlyph"
)]
#[case::bad_category(
    [0xB0, 0xA1], *b"brush\0", vec![0.0, 1.0, 1.0, 0.0], geometry_metadata("2", "2"), "InvalidCategory"
)]
fn invalid_partitions_are_rejected(
    #[case] glyph: [u8; 2],
    #[case] category: [u8; 6],
    #[case] values: Vec<f32>,
    #[case] field_metadata: HashMap<String, String>,
    #[case] expected: &str,
) -> TestResult {
    let batch = manual_batch(glyph, &category, values, field_metadata, HashMap::new());
    let err = read_dataset(encode(&batch)?, CharacterSet::Gb2312).expect_err("invalid partition");
    let variant = format!("{err:?}");
    assert!(
        variant.starts_with(expected),
        "expected {expected}, got {variant}"
    );
    Ok(())
}
