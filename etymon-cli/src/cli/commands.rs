//! Command implementations and argument parsing for the etymon CLI.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use etymon_core::{
    Category, CharacterSet, CharsetError, DatasetBuilder, DatasetError, Geometry, NormalizeError,
};
use etymon_crawl::{CrawlError, CrawlSummary, CrawlerBuilder};
use etymon_store::{DatasetStore, StoreError};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

const DEFAULT_WORKERS: usize = 5;
const DEFAULT_MAX_ATTEMPTS: u32 = 20;
const DEFAULT_REVERIFY_FACTOR: usize = 2;
const DEFAULT_SIDE: u32 = 64;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "etymon",
    about = "Crawl, normalise, and store historical Chinese glyph images."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Download glyph images for every character of a scheme.
    Fetch(FetchCommand),
    /// Normalise a crawled tree and save it as one store partition.
    Build(BuildCommand),
    /// Normalise one crawled tree per scheme and save them together.
    Pack(PackCommand),
    /// Load a store partition and describe its contents.
    Inspect(InspectCommand),
}

/// Options accepted by the `fetch` command.
#[derive(Debug, Args, Clone)]
pub struct FetchCommand {
    /// Character scheme to enumerate (`gb2312` or `gbk`).
    pub charset: String,

    /// Destination root for the crawled tree.
    pub dir: PathBuf,

    /// Number of parallel workers.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Stop after this many characters of the scheme.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Attempts per page or image before giving up.
    #[arg(long = "max-attempts", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Multiplier of the worker count giving how many recent characters are re-verified.
    #[arg(long = "reverify-factor", default_value_t = DEFAULT_REVERIFY_FACTOR)]
    pub reverify_factor: usize,

    /// Site to crawl (defaults to `ETYMON_BASE_URL` or the public site).
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Directory receiving the timestamped run log.
    #[arg(long = "log-dir", default_value = ".")]
    pub log_dir: PathBuf,
}

/// Output geometry shared by `build` and `pack`.
#[derive(Debug, Args, Clone, Copy)]
pub struct GeometryArgs {
    /// Width of the normalised images.
    #[arg(long, default_value_t = DEFAULT_SIDE)]
    pub width: u32,

    /// Height of the normalised images.
    #[arg(long, default_value_t = DEFAULT_SIDE)]
    pub height: u32,
}

impl Default for GeometryArgs {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIDE,
            height: DEFAULT_SIDE,
        }
    }
}

/// Options accepted by the `build` command.
#[derive(Debug, Args, Clone)]
pub struct BuildCommand {
    /// Character scheme of the crawled tree.
    pub charset: String,

    /// Crawled tree to normalise.
    pub dir: PathBuf,

    /// Dataset store directory.
    pub store: PathBuf,

    /// Output geometry.
    #[command(flatten)]
    pub geometry: GeometryArgs,
}

/// Options accepted by the `pack` command.
#[derive(Debug, Args, Clone)]
pub struct PackCommand {
    /// Crawled GB2312 tree.
    #[arg(long)]
    pub gb2312: Option<PathBuf>,

    /// Crawled GBK tree.
    #[arg(long)]
    pub gbk: Option<PathBuf>,

    /// Dataset store directory.
    pub store: PathBuf,

    /// Output geometry.
    #[command(flatten)]
    pub geometry: GeometryArgs,
}

/// Options accepted by the `inspect` command.
#[derive(Debug, Args, Clone)]
pub struct InspectCommand {
    /// Dataset store directory.
    pub store: PathBuf,

    /// Partition to load (`gb2312` or `gbk`).
    pub charset: String,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// `pack` was given no input trees.
    #[error("pack needs at least one of --gb2312 or --gbk")]
    NoPackInputs,
    /// Scheme name or text codec failure.
    #[error(transparent)]
    Charset(#[from] CharsetError),
    /// Requested geometry was rejected.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    /// Crawl configuration or execution failed.
    #[error(transparent)]
    Crawl(#[from] CrawlError),
    /// Dataset construction failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One partition written by `build` or `pack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummary {
    /// Scheme of the partition.
    pub charset: CharacterSet,
    /// Number of samples written.
    pub samples: usize,
    /// File holding the partition.
    pub path: PathBuf,
}

/// Contents of a loaded partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectSummary {
    /// Scheme of the partition.
    pub charset: CharacterSet,
    /// Geometry of every feature vector.
    pub geometry: Geometry,
    /// Number of samples.
    pub samples: usize,
    /// Number of distinct characters.
    pub characters: usize,
    /// Samples per category, in category order.
    pub per_category: BTreeMap<Category, usize>,
}

/// Summarises the outcome of executing a CLI command.
#[derive(Debug, Clone)]
pub enum ExecutionSummary {
    /// Result of `fetch`.
    Fetch(CrawlSummary),
    /// Partitions written by `build` or `pack`.
    Saved(Vec<PartitionSummary>),
    /// Result of `inspect`.
    Inspect(InspectSummary),
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when parsing or execution fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use etymon_cli::cli::{Cli, CliError, Command, InspectCommand, run_cli};
/// # use tempfile::TempDir;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let dir = TempDir::new()?;
/// let cli = Cli {
///     command: Command::Inspect(InspectCommand {
///         store: dir.path().to_path_buf(),
///         charset: "big5".into(),
///     }),
/// };
/// assert!(matches!(run_cli(cli), Err(CliError::Charset(_))));
/// # Ok(())
/// # }
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    let span = Span::current();
    match cli.command {
        Command::Fetch(command) => {
            span.record("command", field::display("fetch"));
            run_fetch(command).map(ExecutionSummary::Fetch)
        }
        Command::Build(command) => {
            span.record("command", field::display("build"));
            run_build(command).map(|partition| ExecutionSummary::Saved(vec![partition]))
        }
        Command::Pack(command) => {
            span.record("command", field::display("pack"));
            run_pack(command).map(ExecutionSummary::Saved)
        }
        Command::Inspect(command) => {
            span.record("command", field::display("inspect"));
            run_inspect(command).map(ExecutionSummary::Inspect)
        }
    }
}

#[instrument(
    name = "cli.fetch",
    err,
    skip(command),
    fields(charset = %command.charset, dir = %command.dir.display(), workers = command.workers),
)]
pub(super) fn run_fetch(command: FetchCommand) -> Result<CrawlSummary, CliError> {
    let charset: CharacterSet = command.charset.parse()?;
    let mut builder = CrawlerBuilder::new()
        .with_worker_count(command.workers)
        .with_max_attempts(command.max_attempts)
        .with_reverify_factor(command.reverify_factor)
        .with_log_dir(command.log_dir);
    if let Some(limit) = command.limit {
        builder = builder.with_character_limit(limit);
    }
    if let Some(base_url) = command.base_url {
        builder = builder.with_base_url(base_url);
    }
    let summary = builder.build()?.crawl(&command.dir, charset)?;
    info!(
        dispatched = summary.dispatched,
        pruned = summary.pruned.len(),
        "fetch completed"
    );
    Ok(summary)
}

#[instrument(
    name = "cli.build",
    err,
    skip(command),
    fields(charset = %command.charset, dir = %command.dir.display()),
)]
pub(super) fn run_build(command: BuildCommand) -> Result<PartitionSummary, CliError> {
    let charset: CharacterSet = command.charset.parse()?;
    let geometry = Geometry::new(command.geometry.width, command.geometry.height)?;
    let store = DatasetStore::new(command.store);
    build_partition(&store, charset, geometry, command.dir)
}

#[instrument(name = "cli.pack", err, skip(command), fields(store = %command.store.display()))]
pub(super) fn run_pack(command: PackCommand) -> Result<Vec<PartitionSummary>, CliError> {
    let inputs: Vec<(CharacterSet, PathBuf)> = [
        (CharacterSet::Gb2312, command.gb2312),
        (CharacterSet::Gbk, command.gbk),
    ]
    .into_iter()
    .filter_map(|(charset, dir)| dir.map(|dir| (charset, dir)))
    .collect();
    if inputs.is_empty() {
        return Err(CliError::NoPackInputs);
    }
    let geometry = Geometry::new(command.geometry.width, command.geometry.height)?;

    let mut datasets = Vec::with_capacity(inputs.len());
    for (charset, dir) in inputs {
        datasets.push(
            DatasetBuilder::new(charset)
                .with_geometry(geometry)
                .build(dir)?,
        );
    }
    let store = DatasetStore::new(command.store);
    let paths = store.save(&datasets)?;
    Ok(datasets
        .iter()
        .zip(paths)
        .map(|(dataset, path)| PartitionSummary {
            charset: dataset.charset(),
            samples: dataset.len(),
            path,
        })
        .collect())
}

fn build_partition(
    store: &DatasetStore,
    charset: CharacterSet,
    geometry: Geometry,
    dir: PathBuf,
) -> Result<PartitionSummary, CliError> {
    let dataset = DatasetBuilder::new(charset)
        .with_geometry(geometry)
        .build(dir)?;
    let path = store.save_partition(&dataset)?;
    Ok(PartitionSummary {
        charset,
        samples: dataset.len(),
        path,
    })
}

#[instrument(
    name = "cli.inspect",
    err,
    skip(command),
    fields(store = %command.store.display(), charset = %command.charset),
)]
pub(super) fn run_inspect(command: InspectCommand) -> Result<InspectSummary, CliError> {
    let charset: CharacterSet = command.charset.parse()?;
    let dataset = DatasetStore::new(command.store).load(charset.namespace())?;
    let mut per_category = BTreeMap::new();
    for category in dataset.categories() {
        *per_category.entry(category).or_insert(0_usize) += 1;
    }
    let mut characters: Vec<char> = dataset.characters().collect();
    characters.sort_unstable();
    characters.dedup();
    Ok(InspectSummary {
        charset,
        geometry: dataset.geometry(),
        samples: dataset.len(),
        characters: characters.len(),
        per_category,
    })
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use std::io::Cursor;
/// # use std::path::PathBuf;
/// # use etymon_cli::cli::{ExecutionSummary, PartitionSummary, render_summary};
/// # use etymon_core::CharacterSet;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let summary = ExecutionSummary::Saved(vec![PartitionSummary {
///     charset: CharacterSet::Gbk,
///     samples: 3,
///     path: PathBuf::from("store/GBK.parquet"),
/// }]);
/// let mut buffer = Cursor::new(Vec::new());
/// render_summary(&summary, &mut buffer)?;
/// assert_eq!(String::from_utf8(buffer.into_inner())?, "GBK\t3\tstore/GBK.parquet\n");
/// # Ok(())
/// # }
/// ```
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    match summary {
        ExecutionSummary::Fetch(crawl) => render_crawl(crawl, writer),
        ExecutionSummary::Saved(partitions) => {
            for partition in partitions {
                writeln!(
                    writer,
                    "{}\t{}\t{}",
                    partition.charset,
                    partition.samples,
                    partition.path.display()
                )?;
            }
            Ok(())
        }
        ExecutionSummary::Inspect(inspect) => {
            writeln!(writer, "namespace: {}", inspect.charset)?;
            writeln!(
                writer,
                "geometry: {}x{}",
                inspect.geometry.width(),
                inspect.geometry.height()
            )?;
            writeln!(writer, "samples: {}", inspect.samples)?;
            writeln!(writer, "characters: {}", inspect.characters)?;
            for (category, count) in &inspect.per_category {
                writeln!(writer, "{category}\t{count}")?;
            }
            Ok(())
        }
    }
}

fn render_crawl(summary: &CrawlSummary, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "dispatched: {}", summary.dispatched)?;
    writeln!(writer, "trusted: {}", summary.trusted)?;
    writeln!(writer, "pages failed: {}", summary.pages_failed)?;
    writeln!(
        writer,
        "images: {} downloaded, {} skipped, {} failed",
        summary.images_downloaded, summary.images_skipped, summary.images_failed
    )?;
    writeln!(writer, "pruned: {}", summary.pruned.len())?;
    writeln!(writer, "report: {}", summary.report_path.display())?;
    if let Some(path) = &summary.log_path {
        writeln!(writer, "log: {}", path.display())?;
    }
    Ok(())
}
