//! Scripted HTTP client for crawler tests.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use etymon_crawl::{HttpClient, TransportError};

/// Serves canned responses keyed by URL.
///
/// Unknown URLs fail with a 404 status. A URL can be scripted to fail a
/// number of times before its response is served.
#[derive(Default)]
pub struct FakeClient {
    pages: HashMap<String, String>,
    blobs: HashMap<String, Vec<u8>>,
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeClient {
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn with_blob(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.blobs.insert(url.into(), bytes.into());
        self
    }

    pub fn failing(self, url: impl Into<String>, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), times);
        self
    }

    /// Number of requests made for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of requests made.
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    fn record(&self, url: &str) -> Result<(), TransportError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.to_owned())
            .or_default() += 1;
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        match failures.get_mut(url) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(TransportError::Timeout {
                    url: url.to_owned(),
                })
            }
            _ => Ok(()),
        }
    }

    fn not_found(url: &str) -> TransportError {
        TransportError::Status {
            url: url.to_owned(),
            status: 404,
        }
    }
}

impl HttpClient for FakeClient {
    fn get_text(&self, url: &str) -> Result<String, TransportError> {
        self.record(url)?;
        self.pages.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.record(url)?;
        self.blobs.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }
}

/// Page markup listing `seal` images for one character.
pub fn seal_page(sources: &[&str]) -> String {
    let images: String = sources
        .iter()
        .map(|src| format!(r#"<img src="{src}">"#))
        .collect();
    format!(
        r#"<html><body><span id="OracleImages"></span><span id="SealImages">{images}</span></body></html>"#
    )
}
