//! HTTP transport seam.

use std::time::Duration;

use ureq::Agent;

use crate::error::TransportError;

/// Blocking HTTP GET used by the page fetcher and image downloader.
///
/// Implementations are shared by every crawl worker, so they must be
/// thread-safe. Tests substitute a scripted client; production uses
/// [`UreqClient`].
pub trait HttpClient: Send + Sync {
    /// Fetches `url` and returns the response body as text.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the request or body read fails.
    fn get_text(&self, url: &str) -> Result<String, TransportError>;

    /// Fetches `url` and returns the raw response body.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the request or body read fails.
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// [`HttpClient`] backed by a shared `ureq` agent.
#[derive(Clone, Debug)]
pub struct UreqClient {
    agent: Agent,
}

impl UreqClient {
    /// Creates a client whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }

    fn get(&self, url: &str) -> Result<ureq::http::Response<ureq::Body>, TransportError> {
        self.agent.get(url).call().map_err(|err| map_error(url, err))
    }
}

impl HttpClient for UreqClient {
    fn get_text(&self, url: &str) -> Result<String, TransportError> {
        self.get(url)?
            .body_mut()
            .read_to_string()
            .map_err(|err| map_error(url, err))
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.get(url)?
            .body_mut()
            .read_to_vec()
            .map_err(|err| map_error(url, err))
    }
}

fn map_error(url: &str, err: ureq::Error) -> TransportError {
    let url = url.to_owned();
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout { url },
        ureq::Error::StatusCode(status) => TransportError::Status { url, status },
        other => TransportError::Request {
            url,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::status(ureq::Error::StatusCode(503), TransportError::Status { url: "u".into(), status: 503 })]
    #[case::timeout(
        ureq::Error::Timeout(ureq::Timeout::Global),
        TransportError::Timeout { url: "u".into() }
    )]
    fn maps_ureq_errors(#[case] err: ureq::Error, #[case] expected: TransportError) {
        assert_eq!(map_error("u", err), expected);
    }

    #[test]
    fn other_errors_keep_their_message() {
        let mapped = map_error("u", ureq::Error::HostNotFound);
        assert!(matches!(mapped, TransportError::Request { ref message, .. } if !message.is_empty()));
    }
}
