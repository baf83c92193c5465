//! Process-wide logging for the etymon binary.
//!
//! Diagnostics go to `stderr` so summaries printed on `stdout` stay
//! machine-readable. `RUST_LOG` picks the level (default `info`) and
//! `ETYMON_LOG_FORMAT` picks between `human` and `json` output. Crates that
//! log through the `log` facade are bridged into `tracing`.
//!
//! The crawl run log is separate: `etymon-crawl` writes its own per-run file
//! through an explicit handle and does not depend on this subscriber.

use std::{env, fmt, str::FromStr, sync::OnceLock};

use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt::format::FmtSpan, layer::SubscriberExt};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "ETYMON_LOG_FORMAT";

const DEFAULT_DIRECTIVE: &str = "info";

static INSTALLED: OnceLock<LogFormat> = OnceLock::new();

/// Output format of the global subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable text.
    #[default]
    Human,
    /// One JSON object per event, including the current span list.
    Json,
}

impl LogFormat {
    /// Reads the format from [`LOG_FORMAT_ENV`], defaulting to
    /// [`LogFormat::Human`] when unset.
    ///
    /// # Errors
    /// Returns [`LoggingError::InvalidUnicode`] or
    /// [`LoggingError::UnsupportedFormat`] for unusable values.
    pub fn from_env() -> Result<Self, LoggingError> {
        match env::var(LOG_FORMAT_ENV) {
            Ok(raw) => raw.parse(),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(source @ env::VarError::NotUnicode(_)) => Err(LoggingError::InvalidUnicode {
                name: LOG_FORMAT_ENV,
                source,
            }),
        }
    }

    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = tracing_subscriber::fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr);
        match self {
            Self::Human => layer.boxed(),
            Self::Json => layer
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        }
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::UnsupportedFormat {
                provided: raw.trim().to_owned(),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Human => "human",
            Self::Json => "json",
        })
    }
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoggingError {
    /// An environment variable held bytes that are not UTF-8.
    #[error("environment variable `{name}` contained invalid UTF-8: {source}")]
    InvalidUnicode {
        /// Variable that was read.
        name: &'static str,
        /// Underlying failure.
        #[source]
        source: env::VarError,
    },
    /// `ETYMON_LOG_FORMAT` named a format other than `human` or `json`.
    #[error("unsupported log format `{provided}`; expected `human` or `json`")]
    UnsupportedFormat {
        /// Value supplied by the user.
        provided: String,
    },
    /// Another global subscriber is already installed.
    #[error("failed to install tracing subscriber: {source}")]
    InstallFailed {
        /// Error raised by `tracing`.
        #[source]
        source: SetGlobalDefaultError,
    },
}

/// Installs the global subscriber once per process and returns the format in
/// use.
///
/// Later calls return the format chosen by the first successful call without
/// touching the environment again.
///
/// If another subscriber already owns the global slot, that subscriber is
/// kept and a one-line notice is written to stderr.
///
/// # Errors
/// Returns [`LoggingError`] when the format variable is unusable.
pub fn init_logging() -> Result<LogFormat, LoggingError> {
    if let Some(format) = INSTALLED.get() {
        return Ok(*format);
    }
    let format = LogFormat::from_env()?;
    match install(format) {
        Ok(()) => {}
        Err(LoggingError::InstallFailed { source }) => report_existing_subscriber(&source),
        Err(err) => return Err(err),
    }
    Ok(*INSTALLED.get_or_init(|| format))
}

#[expect(
    clippy::print_stderr,
    reason = "the global subscriber belongs to someone else, so tracing cannot report this"
)]
fn report_existing_subscriber(source: &SetGlobalDefaultError) {
    eprintln!("structured logging already configured elsewhere: {source}");
}

fn install(format: LogFormat) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    // The bridge is installed once, here; a logger already owning `log`
    // keeps it.
    let _ = LogTracer::init();

    let subscriber = tracing_subscriber::registry().with(format.layer().with_filter(filter));
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|source| LoggingError::InstallFailed { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::lower("human", LogFormat::Human)]
    #[case::upper("HUMAN", LogFormat::Human)]
    #[case::padded(" json ", LogFormat::Json)]
    fn supported_formats_parse(#[case] raw: &str, #[case] expected: LogFormat) {
        assert_eq!(raw.parse::<LogFormat>().expect("format must parse"), expected);
    }

    #[rstest]
    #[case::unknown("xml")]
    #[case::empty("")]
    fn unknown_formats_are_rejected(#[case] raw: &str) {
        let err = raw.parse::<LogFormat>().expect_err("format is not supported");
        assert!(
            matches!(err, LoggingError::UnsupportedFormat { ref provided } if provided == raw),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn formats_display_as_their_names() {
        assert_eq!(LogFormat::Json.to_string(), "json");
        assert_eq!(
            LogFormat::Human.to_string().parse::<LogFormat>().expect("round trip"),
            LogFormat::Human
        );
    }

    #[test]
    fn existing_global_subscriber_is_tolerated() {
        // Either this call or another test's `init_logging` claims the slot.
        let _ = tracing::subscriber::set_global_default(tracing::subscriber::NoSubscriber::default());

        let err = install(LogFormat::Json).expect_err("global slot is taken");
        assert!(
            matches!(err, LoggingError::InstallFailed { .. }),
            "unexpected error: {err:?}"
        );
        init_logging().expect("an existing subscriber must not be fatal");
    }

    #[test]
    fn init_logging_is_idempotent() {
        let first = init_logging().expect("logging must initialise");
        let second = init_logging().expect("subsequent calls must be no-ops");
        assert_eq!(first, second);
    }
}
