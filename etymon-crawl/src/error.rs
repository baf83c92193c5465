//! Error types for the crawler.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by an [`crate::HttpClient`] for a single request.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("request to `{url}` timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },
    /// The server answered with a non-success status.
    #[error("request to `{url}` returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Any other connection, protocol, or body-read failure.
    #[error("request to `{url}` failed: {message}")]
    Request {
        /// Requested URL.
        url: String,
        /// Transport error rendered as text.
        message: String,
    },
}

/// Which network operation a retry loop was driving.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Fetching a character's reference page.
    Page,
    /// Downloading one glyph image.
    Image,
}

impl Operation {
    /// Short name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one unit of crawl work: a page fetch or an image download.
///
/// These never abort a crawl; the orchestrator logs them, counts them, and
/// moves on to the next unit.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every attempt allowed by the retry policy failed.
    #[error("{operation} `{target}` failed after {attempts} attempts")]
    Exhausted {
        /// Kind of request that was retried.
        operation: Operation,
        /// URL or character the request was for.
        target: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: TransportError,
    },
    /// A category selector could not be compiled.
    #[error("invalid selector `{selector}`: {message}")]
    Selector {
        /// Selector text.
        selector: String,
        /// Parser diagnostic.
        message: String,
    },
    /// The image URL has no final path segment to use as a file name.
    #[error("image url `{url}` has no file name")]
    NoFileName {
        /// Offending URL.
        url: String,
    },
    /// Writing a downloaded image to disk failed.
    #[error("failed to write `{path}`: {source}")]
    Io {
        /// Destination that could not be written.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that stop a crawl from starting or finishing.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A builder parameter was out of range.
    #[error("`{field}` must be greater than zero")]
    InvalidConfig {
        /// Name of the offending parameter.
        field: &'static str,
    },
    /// Filesystem access to the crawl root, report, or log failed.
    #[error("failed to access `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: std::io::Error,
    },
    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl CrawlError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
