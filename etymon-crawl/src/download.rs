//! Idempotent image downloads with atomic writes.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    client::HttpClient,
    error::{FetchError, Operation},
    retry::RetryPolicy,
    run_log::RunLog,
};

/// Result of a single [`ImageDownloader::download`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The image was fetched and written.
    Downloaded {
        /// Size of the written file.
        bytes: usize,
    },
    /// The destination already existed, so nothing was fetched.
    Skipped,
}

/// Final path segment of `url` with any query or fragment removed.
///
/// # Examples
/// ```
/// use etymon_crawl::image_file_name;
///
/// assert_eq!(image_file_name("http://h.test/img/a1.gif?v=2"), Some("a1.gif"));
/// assert_eq!(image_file_name("http://h.test/img/"), None);
/// ```
#[must_use]
pub fn image_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next()?;
    (!name.is_empty() && name != "." && name != "..").then_some(name)
}

/// Downloads images through an [`HttpClient`] with retries.
#[derive(Clone, Copy)]
pub struct ImageDownloader<'a> {
    client: &'a dyn HttpClient,
    retry: RetryPolicy,
}

impl<'a> ImageDownloader<'a> {
    /// Creates a downloader.
    #[must_use]
    pub fn new(client: &'a dyn HttpClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Downloads `url` to `destination` unless the destination already exists.
    ///
    /// Bytes are written to a `.part` sibling and renamed into place, so a
    /// failed download never leaves a file at `destination`.
    ///
    /// # Errors
    /// Returns [`FetchError::Exhausted`] once every attempt has failed and
    /// [`FetchError::Io`] if the file cannot be written.
    pub fn download(
        &self,
        url: &str,
        destination: &Path,
        log: &RunLog,
    ) -> Result<DownloadOutcome, FetchError> {
        if destination.exists() {
            return Ok(DownloadOutcome::Skipped);
        }
        let payload =
            log.in_scope(|| self.retry.run(Operation::Image, url, || self.client.get_bytes(url)))?;
        write_atomic(destination, &payload).map_err(|source| FetchError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
        Ok(DownloadOutcome::Downloaded {
            bytes: payload.len(),
        })
    }

    /// Downloads `url` into `directory`, named after the URL's final path
    /// segment.
    ///
    /// # Errors
    /// Returns [`FetchError::NoFileName`] if the URL has no usable final
    /// segment, otherwise any error from [`ImageDownloader::download`].
    pub fn download_into(
        &self,
        url: &str,
        directory: &Path,
        log: &RunLog,
    ) -> Result<DownloadOutcome, FetchError> {
        let name = image_file_name(url).ok_or_else(|| FetchError::NoFileName {
            url: url.to_owned(),
        })?;
        self.download(url, &directory.join(name), log)
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let part = part_path(path);
    fs::write(&part, bytes)?;
    fs::rename(&part, path)
}
