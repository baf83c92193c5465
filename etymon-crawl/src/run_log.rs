//! Per-run warning and error log shared by every crawl worker.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Local;
use tracing::{Dispatch, dispatcher};
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt};

use crate::error::CrawlError;

/// Explicit handle to the log sink of one crawl run.
///
/// Fetch and download calls receive the handle as an argument and emit their
/// retry and failure events inside [`RunLog::in_scope`]. The production sink
/// appends WARN and ERROR events to `<log_dir>/YYYYMMDDHHMMSS.log` through a
/// single shared file handle and mirrors them to stderr.
#[derive(Clone)]
pub struct RunLog {
    dispatch: Dispatch,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog").field("path", &self.path).finish_non_exhaustive()
    }
}

impl RunLog {
    /// Opens a new timestamped log file in `log_dir`.
    ///
    /// # Errors
    /// Returns [`CrawlError::Io`] if the directory or file cannot be created.
    pub fn create(log_dir: &Path) -> Result<Self, CrawlError> {
        fs::create_dir_all(log_dir).map_err(CrawlError::io(log_dir))?;
        let path = log_dir.join(format!("{}.log", Local::now().format("%Y%m%d%H%M%S")));
        let file: Arc<File> = Arc::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(CrawlError::io(&path))?,
        );
        let subscriber = tracing_subscriber::registry()
            .with(LevelFilter::WARN)
            .with(fmt::layer().with_writer(file).with_ansi(false))
            .with(fmt::layer().with_writer(io::stderr));
        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            path: Some(path),
        })
    }

    /// Wraps an arbitrary dispatcher, typically a recording one in tests.
    #[must_use]
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self {
            dispatch,
            path: None,
        }
    }

    /// A handle that discards every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self::from_dispatch(Dispatch::none())
    }

    /// Runs `work` with this log as the current dispatcher.
    pub fn in_scope<T>(&self, work: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, work)
    }

    /// Path of the backing file, if the log writes to one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracing::{info, warn};

    #[test]
    fn writes_warnings_to_a_timestamped_file() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let log = RunLog::create(dir.path()).expect("log file opens");
        let path = log.path().expect("file-backed log").to_path_buf();

        log.in_scope(|| {
            info!("not persisted");
            warn!(character = %'啊', "persisted");
        });

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .expect("utf-8 name");
        assert_eq!(name.len(), "YYYYMMDDHHMMSS.log".len());
        assert!(name.ends_with(".log"));
        let contents = fs::read_to_string(&path).expect("log readable");
        assert!(contents.contains("persisted"));
        assert!(contents.contains('啊'));
        assert!(!contents.contains("not persisted"));
    }

    #[test]
    fn disabled_log_has_no_file() {
        let log = RunLog::disabled();
        assert!(log.path().is_none());
        assert_eq!(log.in_scope(|| 7), 7);
    }
}
