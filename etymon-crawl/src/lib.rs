//! Concurrent crawler for character glyph images.
//!
//! A [`Crawler`] enumerates a [`etymon_core::CharacterSet`], fetches each
//! character's reference page through an [`HttpClient`], and downloads the
//! listed images into `root/<character>/<category>/<file>`. Network failures
//! are retried a bounded number of times and then logged to the run's
//! [`RunLog`]; they never abort the crawl.

mod client;
mod crawler;
mod download;
mod error;
mod page;
mod prune;
mod resume;
mod retry;
mod run_log;

pub use crate::{
    client::{HttpClient, UreqClient},
    crawler::{
        BASE_URL_ENV, Crawler, CrawlerBuilder, CrawlSummary, DEFAULT_BASE_URL, DEFAULT_REPORT_FILE,
    },
    download::{DownloadOutcome, ImageDownloader, image_file_name},
    error::{CrawlError, FetchError, Operation, TransportError},
    page::{CategoryImages, PageFetcher, extract_image_sources, page_url, resolve_image_url},
    prune::{directory_size, prune_empty},
    resume::ResumePlan,
    retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy},
    run_log::RunLog,
};
