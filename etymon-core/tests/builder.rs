#![expect(clippy::expect_used, reason = "tests require contextual panics")]
//! Integration tests for walking a crawled tree into a dataset.

use std::{error::Error, fs, path::Path};

use etymon_core::{Category, CharacterSet, DatasetBuilder, Geometry};
use image::{GrayImage, Luma};
use rstest::{fixture, rstest};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

#[fixture]
fn tree() -> TempDir {
    tempfile::tempdir().expect("temporary directory")
}

fn geometry() -> Geometry {
    Geometry::new(4, 4).expect("positive geometry")
}

/// Writes a PNG whose left half is black and right half white.
fn write_glyph(root: &Path, character: &str, category: &str, file: &str) -> TestResult {
    let dir = root.join(character).join(category);
    fs::create_dir_all(&dir)?;
    GrayImage::from_fn(8, 8, |x, _| Luma([if x < 4 { 0 } else { 200 }])).save(dir.join(file))?;
    Ok(())
}

#[rstest]
fn corrupt_files_are_removed_and_siblings_kept(tree: TempDir) -> TestResult {
    let root = tree.path();
    write_glyph(root, "啊", "oracle", "a.png")?;
    let corrupt = root.join("啊").join("oracle").join("b.gif");
    fs::write(&corrupt, b"GIF89a truncated")?;
    write_glyph(root, "啊", "oracle", "c.png")?;

    let dataset = DatasetBuilder::new(CharacterSet::Gb2312)
        .with_geometry(geometry())
        .build(root)?;

    assert_eq!(dataset.len(), 2);
    assert!(!corrupt.exists(), "corrupt file must be deleted");
    assert!(root.join("啊").join("oracle").join("c.png").exists());
    Ok(())
}

#[rstest]
fn walk_order_is_sorted_and_labels_follow_directories(tree: TempDir) -> TestResult {
    let root = tree.path();
    write_glyph(root, "阿", "seal", "1.png")?;
    write_glyph(root, "啊", "seal", "2.png")?;
    write_glyph(root, "啊", "bronze", "1.png")?;

    let dataset = DatasetBuilder::new(CharacterSet::Gbk)
        .with_geometry(geometry())
        .build(root)?;

    assert_eq!(dataset.characters().collect::<String>(), "啊啊阿");
    assert_eq!(
        dataset.categories().collect::<Vec<_>>(),
        vec![Category::Bronze, Category::Seal, Category::Seal]
    );
    let first_row = dataset
        .samples()
        .first()
        .expect("dataset has samples")
        .features
        .as_slice()
        .to_vec();
    assert_eq!(first_row, vec![0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1]);
    Ok(())
}

#[rstest]
fn stray_entries_are_ignored(tree: TempDir) -> TestResult {
    let root = tree.path();
    write_glyph(root, "啊", "seal", "1.png")?;
    write_glyph(root, "啊", "clerical", "1.png")?;
    write_glyph(root, "ab", "seal", "1.png")?;
    write_glyph(root, "丂", "seal", "1.png")?;
    fs::write(root.join("not_analyzed.txt"), "")?;
    fs::write(root.join("啊").join("notes.txt"), "loose file")?;

    let dataset = DatasetBuilder::new(CharacterSet::Gb2312)
        .with_geometry(geometry())
        .build(root)?;

    assert_eq!(dataset.characters().collect::<String>(), "啊");
    Ok(())
}

#[rstest]
fn blank_images_are_skipped_but_kept_on_disk(tree: TempDir) -> TestResult {
    let root = tree.path();
    let dir = root.join("啊").join("lst");
    fs::create_dir_all(&dir)?;
    let blank = dir.join("blank.png");
    GrayImage::from_pixel(5, 5, Luma([255])).save(&blank)?;

    let dataset = DatasetBuilder::new(CharacterSet::Gb2312).build(root)?;

    assert!(dataset.is_empty());
    assert!(blank.exists());
    Ok(())
}

#[cfg(unix)]
#[rstest]
fn unreadable_files_are_skipped_and_the_build_continues(tree: TempDir) -> TestResult {
    let root = tree.path();
    write_glyph(root, "啊", "seal", "a.png")?;
    let dangling = root.join("啊").join("seal").join("b.png");
    std::os::unix::fs::symlink(root.join("nowhere.png"), &dangling)?;
    write_glyph(root, "啊", "seal", "c.png")?;

    let dataset = DatasetBuilder::new(CharacterSet::Gb2312)
        .with_geometry(geometry())
        .build(root)?;

    assert_eq!(dataset.len(), 2);
    assert!(dangling.symlink_metadata().is_ok(), "unreadable entries are not deleted");
    Ok(())
}

#[rstest]
fn missing_root_is_an_io_error() {
    let err = DatasetBuilder::new(CharacterSet::Gbk)
        .build("/definitely/not/a/crawl/root")
        .expect_err("missing root must fail");
    assert!(matches!(err, etymon_core::DatasetError::Io { .. }));
}
