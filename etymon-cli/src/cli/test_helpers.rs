//! Fixture builders shared by the CLI unit tests.

use std::fs;
use std::io;
use std::path::Path;

use image::{GrayImage, ImageError, Luma};
use tempfile::TempDir;

use super::{Cli, CliError, run_cli};

pub(super) fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    }
}

/// Writes an 8x8 PNG under `root/<character>/<category>/<file>` whose left
/// `ink_columns` columns are black.
pub(super) fn write_glyph(
    root: &Path,
    character: &str,
    category: &str,
    file: &str,
    ink_columns: u32,
) -> Result<(), ImageError> {
    let dir = root.join(character).join(category);
    fs::create_dir_all(&dir).map_err(ImageError::IoError)?;
    GrayImage::from_fn(8, 8, |x, _| Luma([if x < ink_columns { 0 } else { 255 }]))
        .save(dir.join(file))
}

pub(super) fn write_bytes(root: &Path, relative: &str, bytes: &[u8]) -> io::Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

pub(super) fn run_cli_expecting_error(cli: Cli, panic_msg: &str) -> CliError {
    match run_cli(cli) {
        Ok(_) => panic!("{panic_msg}"),
        Err(err) => err,
    }
}
