//! Crawl orchestration across a bounded worker pool.

use std::{
    env, fs,
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use etymon_core::CharacterSet;
use rayon::{ThreadPoolBuilder, prelude::*};
use tracing::{error, info, instrument, warn};

use crate::{
    client::{HttpClient, UreqClient},
    download::{DownloadOutcome, ImageDownloader},
    error::{CrawlError, FetchError},
    page::PageFetcher,
    prune::prune_empty,
    resume::ResumePlan,
    retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy},
    run_log::RunLog,
};

/// Site crawled when neither the builder nor `ETYMON_BASE_URL` overrides it.
pub const DEFAULT_BASE_URL: &str = "http://www.chineseetymology.org";
/// Environment variable consulted for the default base URL.
pub const BASE_URL_ENV: &str = "ETYMON_BASE_URL";
/// File, inside the crawl root, listing characters pruned for having no data.
pub const DEFAULT_REPORT_FILE: &str = "not_analyzed.txt";

/// Configures and constructs a [`Crawler`].
///
/// # Examples
/// ```
/// use etymon_crawl::CrawlerBuilder;
///
/// let builder = CrawlerBuilder::new().with_worker_count(8).with_character_limit(100);
/// assert_eq!(builder.worker_count(), 8);
/// assert_eq!(builder.reverify_window(), 16);
/// assert!(CrawlerBuilder::new().with_worker_count(0).build().is_err());
/// ```
#[derive(Clone, Debug)]
pub struct CrawlerBuilder {
    base_url: String,
    worker_count: usize,
    max_attempts: u32,
    reverify_factor: usize,
    character_limit: Option<usize>,
    log_dir: PathBuf,
    report_file_name: String,
    request_timeout: Duration,
}

impl Default for CrawlerBuilder {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            worker_count: 5,
            max_attempts: DEFAULT_MAX_ATTEMPTS.get(),
            reverify_factor: 2,
            character_limit: None,
            log_dir: PathBuf::from("."),
            report_file_name: DEFAULT_REPORT_FILE.to_owned(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl CrawlerBuilder {
    /// Creates a builder populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the site root that page URLs are built from.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the number of parallel workers.
    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Sets the attempt budget for every page and image request.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets how many workers' worth of recent characters are re-verified.
    #[must_use]
    pub fn with_reverify_factor(mut self, factor: usize) -> Self {
        self.reverify_factor = factor;
        self
    }

    /// Stops enumeration after `limit` characters.
    #[must_use]
    pub fn with_character_limit(mut self, limit: usize) -> Self {
        self.character_limit = Some(limit);
        self
    }

    /// Sets the directory that receives the per-run log file.
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Sets the name of the pruned-character report inside the crawl root.
    #[must_use]
    pub fn with_report_file_name(mut self, name: impl Into<String>) -> Self {
        self.report_file_name = name.into();
        self
    }

    /// Sets the per-request timeout of the default HTTP client.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of most recent characters re-verified on a re-run.
    #[must_use]
    pub fn reverify_window(&self) -> usize {
        self.reverify_factor.saturating_mul(self.worker_count)
    }

    /// Validates the configuration and builds a crawler over HTTP.
    ///
    /// # Errors
    /// Returns [`CrawlError::InvalidConfig`] when the worker count or attempt
    /// budget is zero.
    pub fn build(self) -> Result<Crawler, CrawlError> {
        let client = Arc::new(UreqClient::new(self.request_timeout));
        self.build_with_client(client)
    }

    /// Validates the configuration and builds a crawler over `client`.
    ///
    /// # Errors
    /// Returns [`CrawlError::InvalidConfig`] when the worker count or attempt
    /// budget is zero.
    pub fn build_with_client(self, client: Arc<dyn HttpClient>) -> Result<Crawler, CrawlError> {
        if self.worker_count == 0 {
            return Err(CrawlError::InvalidConfig {
                field: "worker_count",
            });
        }
        let max_attempts = NonZeroU32::new(self.max_attempts).ok_or(CrawlError::InvalidConfig {
            field: "max_attempts",
        })?;
        Ok(Crawler {
            retry: RetryPolicy::new(max_attempts),
            reverify_window: self.reverify_window(),
            base_url: self.base_url,
            worker_count: self.worker_count,
            character_limit: self.character_limit,
            log_dir: self.log_dir,
            report_file_name: self.report_file_name,
            client,
        })
    }
}

fn default_base_url() -> String {
    env::var(BASE_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
}

/// Counters and outputs of one crawl run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Characters handed to workers.
    pub dispatched: usize,
    /// Previously crawled characters skipped as trusted.
    pub trusted: usize,
    /// Characters whose page could not be fetched.
    pub pages_failed: usize,
    /// Images written during this run.
    pub images_downloaded: usize,
    /// Images skipped because they already existed.
    pub images_skipped: usize,
    /// Images that could not be fetched or written.
    pub images_failed: usize,
    /// Characters removed for having no data, in file-name order.
    pub pruned: Vec<String>,
    /// Location of the pruned-character report.
    pub report_path: PathBuf,
    /// Location of the run log, when file-backed.
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicUsize,
    pages_failed: AtomicUsize,
    images_downloaded: AtomicUsize,
    images_skipped: AtomicUsize,
    images_failed: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Harvests glyph images for every character of a scheme into a directory
/// tree `root/<character>/<category>/<file>`.
pub struct Crawler {
    client: Arc<dyn HttpClient>,
    base_url: String,
    worker_count: usize,
    retry: RetryPolicy,
    reverify_window: usize,
    character_limit: Option<usize>,
    log_dir: PathBuf,
    report_file_name: String,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("base_url", &self.base_url)
            .field("worker_count", &self.worker_count)
            .field("retry", &self.retry)
            .field("reverify_window", &self.reverify_window)
            .field("character_limit", &self.character_limit)
            .finish_non_exhaustive()
    }
}

impl Crawler {
    /// Crawls `charset` into `root`, logging to a new timestamped file in the
    /// configured log directory.
    ///
    /// # Errors
    /// See [`Crawler::crawl_with_log`]; also fails if the log file cannot be
    /// created.
    pub fn crawl(&self, root: &Path, charset: CharacterSet) -> Result<CrawlSummary, CrawlError> {
        let log = RunLog::create(&self.log_dir)?;
        self.crawl_with_log(root, charset, &log)
    }

    /// Crawls `charset` into `root`, sending retry and failure events to `log`.
    ///
    /// Individual page and image failures are logged and counted, never
    /// returned. Blocks until every worker finishes, then prunes empty
    /// characters and rewrites the report.
    ///
    /// # Errors
    /// Returns [`CrawlError::Io`] when the root, report, or a resume scan
    /// fails, and [`CrawlError::ThreadPool`] if the pool cannot start.
    #[instrument(
        name = "crawl.run",
        err,
        skip_all,
        fields(root = %root.display(), charset = %charset, workers = self.worker_count),
    )]
    pub fn crawl_with_log(
        &self,
        root: &Path,
        charset: CharacterSet,
        log: &RunLog,
    ) -> Result<CrawlSummary, CrawlError> {
        let report_path = root.join(&self.report_file_name);
        if report_path.exists() {
            fs::remove_file(&report_path).map_err(CrawlError::io(&report_path))?;
        }
        fs::create_dir_all(root).map_err(CrawlError::io(root))?;

        let plan = ResumePlan::scan(root, self.reverify_window)?;
        info!(
            trusted = plan.trusted_count(),
            reverified = plan.reverified().len(),
            "resuming crawl"
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.worker_count)
            .thread_name(|index| format!("etymon-crawl-{index}"))
            .build()?;
        let counters = Counters::default();
        let trusted = AtomicUsize::new(0);
        let limit = self.character_limit.unwrap_or(usize::MAX);
        pool.install(|| {
            charset
                .characters()
                .take(limit)
                .filter(|&character| {
                    let keep = !plan.is_trusted(character);
                    if !keep {
                        bump(&trusted);
                    }
                    keep
                })
                .par_bridge()
                .for_each(|character| self.crawl_character(root, character, log, &counters));
        });

        let pruned = prune_empty(root, &report_path)?;
        let summary = CrawlSummary {
            dispatched: counters.dispatched.into_inner(),
            trusted: trusted.into_inner(),
            pages_failed: counters.pages_failed.into_inner(),
            images_downloaded: counters.images_downloaded.into_inner(),
            images_skipped: counters.images_skipped.into_inner(),
            images_failed: counters.images_failed.into_inner(),
            pruned,
            report_path,
            log_path: log.path().map(Path::to_path_buf),
        };
        info!(
            dispatched = summary.dispatched,
            downloaded = summary.images_downloaded,
            failed = summary.images_failed,
            pruned = summary.pruned.len(),
            "crawl finished"
        );
        Ok(summary)
    }

    fn crawl_character(&self, root: &Path, character: char, log: &RunLog, counters: &Counters) {
        bump(&counters.dispatched);
        // Created before the fetch so a failed page leaves an empty tree that
        // pruning reports as not analyzed.
        let character_dir = root.join(character.to_string());
        if let Err(err) = fs::create_dir_all(&character_dir) {
            bump(&counters.pages_failed);
            log.in_scope(|| error!(path = %character_dir.display(), error = %err, "cannot create character directory"));
            return;
        }

        let fetcher = PageFetcher::new(self.client.as_ref(), &self.base_url, self.retry);
        let images = match fetcher.fetch(character, log) {
            Ok(images) => images,
            Err(err) => {
                bump(&counters.pages_failed);
                log.in_scope(|| error!(%character, error = %err, "skipping character"));
                return;
            }
        };

        let downloader = ImageDownloader::new(self.client.as_ref(), self.retry);
        for (category, urls) in images.iter() {
            let category_dir = character_dir.join(category.as_str());
            if let Err(err) = fs::create_dir_all(&category_dir) {
                counters
                    .images_failed
                    .fetch_add(urls.len(), Ordering::Relaxed);
                log.in_scope(|| error!(path = %category_dir.display(), error = %err, "cannot create category directory"));
                continue;
            }
            for url in urls {
                match downloader.download_into(url, &category_dir, log) {
                    Ok(DownloadOutcome::Downloaded { .. }) => {
                        bump(&counters.images_downloaded);
                    }
                    Ok(DownloadOutcome::Skipped) => bump(&counters.images_skipped),
                    Err(err @ FetchError::NoFileName { .. }) => {
                        bump(&counters.images_failed);
                        log.in_scope(|| warn!(%character, error = %err, "skipping image"));
                    }
                    Err(err) => {
                        bump(&counters.images_failed);
                        log.in_scope(|| error!(%character, url, error = %err, "skipping image"));
                    }
                }
            }
        }
    }
}
