//! Decides which previously crawled characters can be trusted on a re-run.

use std::{collections::BTreeSet, fs, path::Path, time::SystemTime};

use crate::error::CrawlError;

/// Character directories already present under a crawl root, split by trust.
///
/// The most recently modified directories may come from an interrupted run,
/// so they are re-verified; everything older is trusted as complete and is
/// never re-fetched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResumePlan {
    trusted: BTreeSet<String>,
    reverified: Vec<String>,
}

impl ResumePlan {
    /// Scans `root` and leaves the newest `window` character directories
    /// eligible for re-fetching.
    ///
    /// A missing root yields an empty plan.
    ///
    /// # Errors
    /// Returns [`CrawlError::Io`] if `root` exists but cannot be listed.
    pub fn scan(root: &Path, window: usize) -> Result<Self, CrawlError> {
        if !root.exists() {
            return Ok(Self::default());
        }
        let mut dirs = Vec::new();
        for entry in fs::read_dir(root).map_err(CrawlError::io(root))? {
            let entry = entry.map_err(CrawlError::io(root))?;
            let metadata = entry.metadata().map_err(CrawlError::io(entry.path()))?;
            if !metadata.is_dir() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            dirs.push((modified, entry.file_name().to_string_lossy().into_owned()));
        }
        dirs.sort();
        let split = dirs.len().saturating_sub(window);
        let reverified = dirs.split_off(split).into_iter().map(|(_, name)| name).collect();
        let trusted = dirs.into_iter().map(|(_, name)| name).collect();
        Ok(Self {
            trusted,
            reverified,
        })
    }

    /// Returns `true` if `character` was crawled before and is trusted.
    #[must_use]
    pub fn is_trusted(&self, character: char) -> bool {
        let mut buffer = [0_u8; 4];
        self.trusted.contains(&*character.encode_utf8(&mut buffer))
    }

    /// Number of trusted directories.
    #[must_use]
    pub fn trusted_count(&self) -> usize {
        self.trusted.len()
    }

    /// Directories eligible for re-verification, oldest first.
    #[must_use]
    pub fn reverified(&self) -> &[String] {
        &self.reverified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{fs::File, time::Duration};

    use rstest::rstest;

    fn seed(root: &Path, names: &[char]) {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        for (offset, name) in (0_u64..).zip(names) {
            let dir = root.join(name.to_string());
            fs::create_dir(&dir).expect("create character dir");
            File::open(&dir)
                .and_then(|handle| handle.set_modified(base + Duration::from_secs(offset)))
                .expect("set mtime");
        }
    }

    #[rstest]
    #[case::window_smaller(2, 3, 2)]
    #[case::window_covers_all(10, 0, 5)]
    #[case::zero_window(0, 5, 0)]
    fn trusts_all_but_the_newest_window(
        #[case] window: usize,
        #[case] trusted: usize,
        #[case] reverified: usize,
    ) {
        let dir = tempfile::tempdir().expect("temporary directory");
        seed(dir.path(), &['一', '丁', '七', '万', '丈']);
        let plan = ResumePlan::scan(dir.path(), window).expect("scan succeeds");
        assert_eq!(plan.trusted_count(), trusted);
        assert_eq!(plan.reverified().len(), reverified);
    }

    #[test]
    fn newest_directories_are_the_ones_reverified() {
        let dir = tempfile::tempdir().expect("temporary directory");
        seed(dir.path(), &['丈', '一', '万']);
        fs::write(dir.path().join("not_analyzed.txt"), "").expect("write stray file");
        let plan = ResumePlan::scan(dir.path(), 2).expect("scan succeeds");
        assert!(plan.is_trusted('丈'));
        assert!(!plan.is_trusted('一'));
        assert_eq!(plan.reverified(), ["一".to_owned(), "万".to_owned()]);
    }

    #[test]
    fn missing_root_yields_empty_plan() {
        let plan = ResumePlan::scan(Path::new("/no/such/crawl/root"), 4).expect("scan succeeds");
        assert_eq!(plan, ResumePlan::default());
    }
}
