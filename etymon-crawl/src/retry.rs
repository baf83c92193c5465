//! Bounded immediate-retry loop shared by page fetches and image downloads.

use std::num::NonZeroU32;

use tracing::{error, warn};

use crate::error::{FetchError, Operation, TransportError};

/// Attempts allowed per page or image unless overridden.
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(20) {
    Some(attempts) => attempts,
    None => NonZeroU32::MIN,
};

/// Retries a request immediately, up to a fixed number of attempts.
///
/// Each failed attempt that will be retried logs a warning; exhausting the
/// budget logs one error and returns [`FetchError::Exhausted`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` tries.
    #[must_use]
    pub const fn new(max_attempts: NonZeroU32) -> Self {
        Self { max_attempts }
    }

    /// Maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(self) -> NonZeroU32 {
        self.max_attempts
    }

    /// Runs `request` until it succeeds or the attempt budget is spent.
    ///
    /// # Errors
    /// Returns [`FetchError::Exhausted`] carrying the last transport error.
    pub fn run<T>(
        self,
        operation: Operation,
        target: &str,
        mut request: impl FnMut() -> Result<T, TransportError>,
    ) -> Result<T, FetchError> {
        let max_attempts = self.max_attempts.get();
        let mut attempt = 1;
        loop {
            match request() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts => {
                    warn!(%operation, target, attempt, max_attempts, error = %err, "request failed; retrying");
                    attempt += 1;
                }
                Err(err) => {
                    error!(%operation, target, attempts = attempt, error = %err, "giving up");
                    return Err(FetchError::Exhausted {
                        operation,
                        target: target.to_owned(),
                        attempts: attempt,
                        last: err,
                    });
                }
            }
        }
    }
}
