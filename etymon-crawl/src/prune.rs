//! Post-crawl removal of characters that produced no data.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use tracing::{info, instrument};

use crate::error::CrawlError;

/// Total size in bytes of all files beneath `path`.
///
/// # Errors
/// Returns the first I/O error met while walking the tree.
pub fn directory_size(path: &Path) -> io::Result<u64> {
    let mut total = 0_u64;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        total = total.saturating_add(if metadata.is_dir() {
            directory_size(&entry.path())?
        } else {
            metadata.len()
        });
    }
    Ok(total)
}

/// Deletes every character directory under `root` whose tree holds zero
/// bytes and writes their names, one per line, to `report`.
///
/// The report is rewritten even when nothing is pruned. Returns the pruned
/// names in file-name order.
///
/// # Errors
/// Returns [`CrawlError::Io`] if the root cannot be listed, a directory
/// cannot be removed, or the report cannot be written.
#[instrument(name = "crawl.prune", err, skip_all, fields(root = %root.display()))]
pub fn prune_empty(root: &Path, report: &Path) -> Result<Vec<String>, CrawlError> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(CrawlError::io(root))? {
        let entry = entry.map_err(CrawlError::io(root))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut pruned = Vec::new();
    for dir in dirs {
        if directory_size(&dir).map_err(CrawlError::io(&dir))? != 0 {
            continue;
        }
        fs::remove_dir_all(&dir).map_err(CrawlError::io(&dir))?;
        if let Some(name) = dir.file_name() {
            pruned.push(name.to_string_lossy().into_owned());
        }
    }

    write_report(report, &pruned).map_err(CrawlError::io(report))?;
    info!(pruned = pruned.len(), "pruned empty characters");
    Ok(pruned)
}

fn write_report(path: &Path, names: &[String]) -> io::Result<()> {
    let mut file = io::BufWriter::new(fs::File::create(path)?);
    for name in names {
        writeln!(file, "{name}")?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_summed_recursively() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).expect("create nested dirs");
        fs::write(dir.path().join("a").join("x"), [0_u8; 3]).expect("write file");
        fs::write(nested.join("y"), [0_u8; 4]).expect("write file");
        assert_eq!(directory_size(dir.path()).expect("walk succeeds"), 7);
    }

    #[test]
    fn removes_empty_trees_and_reports_them() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let root = dir.path();
        fs::create_dir_all(root.join("啊").join("seal")).expect("create dirs");
        fs::write(root.join("啊").join("seal").join("1.gif"), b"GIF").expect("write image");
        fs::create_dir_all(root.join("阿").join("oracle")).expect("create dirs");
        fs::write(root.join("阿").join("oracle").join("empty.gif"), b"").expect("write empty");
        fs::create_dir(root.join("吖")).expect("create dir");
        let report = root.join("not_analyzed.txt");

        let pruned = prune_empty(root, &report).expect("prune succeeds");

        assert_eq!(pruned, vec!["吖".to_owned(), "阿".to_owned()]);
        assert!(root.join("啊").exists());
        assert!(!root.join("阿").exists());
        assert_eq!(
            fs::read_to_string(&report).expect("report readable"),
            "吖\n阿\n"
        );
    }

    #[test]
    fn report_is_written_even_when_nothing_is_pruned() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let report = dir.path().join("not_analyzed.txt");
        fs::write(&report, "stale\n").expect("seed stale report");
        let pruned = prune_empty(dir.path(), &report).expect("prune succeeds");
        assert!(pruned.is_empty());
        assert_eq!(fs::read_to_string(&report).expect("report readable"), "");
    }
}
