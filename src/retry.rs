//! Bounded retry for store calls.
//!
//! Only [`StoreError::Transient`] failures are retried. Backoff grows
//! linearly with the attempt number, and the cancel token is checked before
//! every attempt. A backoff that would run past the token's deadline gives up
//! right away instead of sleeping.

use std::thread;
use std::time::Duration;

use log::warn;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::error::{IngestError, Stage, StoreError};

/// Why a retried store call gave up
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cancelled before {0}")]
    Cancelled(Stage),
}

impl AttemptError {
    /// Turn a store failure into the caller's error; cancellation stays cancellation
    pub fn into_ingest<F>(self, wrap: F) -> IngestError
    where
        F: FnOnce(StoreError) -> IngestError,
    {
        match self {
            AttemptError::Store(source) => wrap(source),
            AttemptError::Cancelled(stage) => IngestError::Cancelled { stage },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay after the first failure; attempt `n` waits `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            backoff,
        }
    }

    pub fn run<T, F>(&self, stage: Stage, cancel: &CancelToken, mut op: F) -> Result<T, AttemptError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(AttemptError::Cancelled(stage));
            }

            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.backoff.saturating_mul(attempt);

                    // A wait that reaches the deadline could never be followed by an attempt
                    if let Some(remaining) = cancel.remaining() {
                        if delay >= remaining {
                            warn!(
                                "{} attempt {}/{} failed: {}; deadline reached before retry",
                                stage, attempt, attempts, err
                            );
                            return Err(AttemptError::Cancelled(stage));
                        }
                    }

                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        stage, attempt, attempts, err, delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(AttemptError::Store(err)),
            }
        }
    }
}
