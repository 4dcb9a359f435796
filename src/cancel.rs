//! Cooperative cancellation for an ingestion run.
//!
//! The pipeline checks the token at every blocking point: before reading a
//! line, before each store call (including between retries) and before
//! notifying. A token trips when [`CancelToken::cancel`] is called on any
//! clone or when its deadline passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{IngestError, Stage};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }

    /// Time left before the deadline; `None` when the token has no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// `Err(IngestError::Cancelled)` once the token has tripped
    pub fn check(&self, stage: Stage) -> Result<(), IngestError> {
        if self.is_cancelled() {
            return Err(IngestError::Cancelled { stage });
        }
        Ok(())
    }
}
