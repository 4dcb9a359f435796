// 📣 Notification - tell the outside world a run finished
//
// Every notifier receives the final AccountStats. NotifierSet fans out to all
// of them, keeps going when one fails, and reports every failure at once.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::error::NotificationError;
use crate::stats::AccountStats;

pub trait Notifier {
    /// Short label used in logs and errors
    fn name(&self) -> &str;

    fn notify(&self, stats: &AccountStats) -> Result<(), NotificationError>;
}

// ============================================================================
// FAN-OUT
// ============================================================================

/// Ordered list of notifiers invoked one after the other
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: register another notifier
    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }
}

impl Notifier for NotifierSet {
    fn name(&self) -> &str {
        "notifier set"
    }

    fn notify(&self, stats: &AccountStats) -> Result<(), NotificationError> {
        let mut failures = Vec::new();

        for notifier in &self.notifiers {
            if let Err(err) = notifier.notify(stats) {
                warn!("{} notifier failed: {}", notifier.name(), err);
                failures.push(err);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::Aggregate(failures))
        }
    }
}

// ============================================================================
// LOG NOTIFIER
// ============================================================================

/// Writes a one-line summary of the finished run to the log
pub struct LogNotifier {
    account_number: String,
}

impl LogNotifier {
    pub fn new(account_number: impl Into<String>) -> Self {
        LogNotifier {
            account_number: account_number.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, stats: &AccountStats) -> Result<(), NotificationError> {
        info!(
            "New transactions file processed for account {}: {}",
            self.account_number, stats
        );
        Ok(())
    }
}

// ============================================================================
// OUTBOX NOTIFIER
// ============================================================================

/// Appends one JSON line per finished run to a file
///
/// Whatever delivers the message (mail, queue, webhook) reads the outbox.
pub struct OutboxNotifier {
    path: PathBuf,
    account_number: String,
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    account_number: &'a str,
    notified_at: DateTime<Utc>,
    stats: &'a AccountStats,
}

impl OutboxNotifier {
    pub fn new(path: impl Into<PathBuf>, account_number: impl Into<String>) -> Self {
        OutboxNotifier {
            path: path.into(),
            account_number: account_number.into(),
        }
    }
}

impl Notifier for OutboxNotifier {
    fn name(&self) -> &str {
        "outbox"
    }

    fn notify(&self, stats: &AccountStats) -> Result<(), NotificationError> {
        let entry = OutboxEntry {
            account_number: &self.account_number,
            notified_at: Utc::now(),
            stats,
        };

        let line = serde_json::to_string(&entry).map_err(|source| NotificationError::Encode {
            notifier: self.name().to_string(),
            source,
        })?;

        let io_err = |source| NotificationError::Io {
            notifier: self.name().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        writeln!(file, "{}", line).map_err(io_err)?;

        info!("Outbox entry for account {} written to {}", self.account_number, self.path.display());
        Ok(())
    }
}
