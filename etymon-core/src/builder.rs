//! Builds a [`Dataset`] from a crawled `root/<character>/<category>/<file>` tree.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::ImageReader;
use rayon::prelude::*;
use tracing::{error, info, instrument, warn};

use crate::{
    category::Category,
    charset::CharacterSet,
    dataset::{Dataset, Sample},
    error::{DatasetError, NormalizeError},
    normalize::{Geometry, normalize},
};

/// Configures and runs a walk over a crawled directory tree.
///
/// Files that cannot be decoded as images are deleted from disk and skipped.
/// Decodable images with no ink are kept on disk but skipped.
///
/// # Examples
/// ```
/// use etymon_core::{CharacterSet, DatasetBuilder, Geometry};
///
/// let root = tempfile::tempdir().expect("temporary directory");
/// let dataset = DatasetBuilder::new(CharacterSet::Gbk)
///     .with_geometry(Geometry::new(8, 8).expect("positive geometry"))
///     .build(root.path())
///     .expect("an empty tree builds an empty dataset");
/// assert!(dataset.is_empty());
/// assert_eq!(dataset.geometry().dimension(), 64);
/// ```
#[derive(Clone, Debug)]
pub struct DatasetBuilder {
    charset: CharacterSet,
    geometry: Geometry,
}

/// An image file located by the walk, awaiting decoding.
#[derive(Debug)]
struct PendingImage {
    character: char,
    category: Category,
    path: PathBuf,
}

impl DatasetBuilder {
    /// Creates a builder for `charset` with the default 64×64 geometry.
    #[must_use]
    pub fn new(charset: CharacterSet) -> Self {
        Self {
            charset,
            geometry: Geometry::DEFAULT,
        }
    }

    /// Overrides the normalized image geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Returns the configured character set.
    #[must_use]
    pub fn charset(&self) -> CharacterSet {
        self.charset
    }

    /// Returns the configured geometry.
    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Walks `root` and normalizes every image into a sample.
    ///
    /// Entries are visited in file-name order at every level, so the sample
    /// order is deterministic for a given tree.
    ///
    /// # Errors
    /// Returns [`DatasetError::Io`] when a directory cannot be listed. Image
    /// files that cannot be opened are logged and skipped.
    #[instrument(
        name = "dataset.build",
        err,
        skip(self, root),
        fields(root = %root.as_ref().display(), charset = %self.charset),
    )]
    pub fn build(&self, root: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
        let pending = self.collect(root.as_ref())?;
        let found = pending.len();
        let samples = pending
            .into_par_iter()
            .map(|image| self.load(image))
            .collect::<Result<Vec<_>, _>>()?;
        let dataset = Dataset::from_samples(self.charset, self.geometry, samples.into_iter().flatten())?;
        info!(found, kept = dataset.len(), "dataset built");
        Ok(dataset)
    }

    fn collect(&self, root: &Path) -> Result<Vec<PendingImage>, DatasetError> {
        let mut pending = Vec::new();
        for character_dir in sorted_dirs(root)? {
            let Some(character) = self.parse_character(&character_dir) else {
                continue;
            };
            for category_dir in sorted_dirs(&character_dir)? {
                let Some(category) = parse_category(&category_dir) else {
                    continue;
                };
                pending.extend(sorted_files(&category_dir)?.into_iter().map(|path| {
                    PendingImage {
                        character,
                        category,
                        path,
                    }
                }));
            }
        }
        Ok(pending)
    }

    fn parse_character(&self, dir: &Path) -> Option<char> {
        let name = file_name(dir);
        let mut chars = name.chars();
        let character = match (chars.next(), chars.next()) {
            (Some(character), None) => character,
            _ => {
                warn!(path = %dir.display(), "skipping directory not named by a single character");
                return None;
            }
        };
        if self.charset.encode_char(character).is_err() {
            warn!(%character, charset = %self.charset, "skipping character outside the character set");
            return None;
        }
        Some(character)
    }

    fn load(&self, image: PendingImage) -> Result<Option<Sample>, DatasetError> {
        let PendingImage {
            character,
            category,
            path,
        } = image;
        let reader = match ImageReader::open(&path).and_then(ImageReader::with_guessed_format) {
            Ok(reader) => reader,
            Err(err) => {
                error!(path = %path.display(), error = %err, "skipping unreadable image");
                return Ok(None);
            }
        };
        let decoded = match reader.decode() {
            Ok(decoded) => decoded,
            Err(err) => {
                error!(path = %path.display(), error = %err, "removing undecodable image");
                if let Err(remove_err) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %remove_err, "failed to remove undecodable image");
                }
                return Ok(None);
            }
        };
        match normalize(&decoded, self.geometry) {
            Ok(features) => Ok(Some(Sample::new(character, category, features))),
            Err(NormalizeError::EmptyImage { width, height }) => {
                warn!(path = %path.display(), width, height, "skipping image without ink");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn parse_category(dir: &Path) -> Option<Category> {
    match file_name(dir).parse() {
        Ok(category) => Some(category),
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "skipping unknown category directory");
            None
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sorted_dirs(parent: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    sorted_entries(parent, true)
}

fn sorted_files(parent: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    sorted_entries(parent, false)
}

fn sorted_entries(parent: &Path, want_dirs: bool) -> Result<Vec<PathBuf>, DatasetError> {
    let io_err = |source: std::io::Error| DatasetError::Io {
        path: parent.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(parent).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let is_dir = entry.file_type().map_err(io_err)?.is_dir();
        if is_dir == want_dirs {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}
