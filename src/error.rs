// ⚠️ Error Taxonomy - every failure the ingestion run can surface
//
// Fatal by construction: the pipeline halts on the first error and hands it
// back with the stage and record position that produced it.

use std::fmt;
use std::io;
use thiserror::Error;

// ============================================================================
// STAGES
// ============================================================================

/// Point of the ingestion run where an error or cancellation happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AccountLookup,
    AccountProvisioning,
    ReadLine,
    InsertTransaction,
    UpdateBalance,
    Notify,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AccountLookup => "account lookup",
            Stage::AccountProvisioning => "account provisioning",
            Stage::ReadLine => "line read",
            Stage::InsertTransaction => "transaction insert",
            Stage::UpdateBalance => "balance update",
            Stage::Notify => "notification",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PARSE ERRORS
// ============================================================================

/// Why a feed line was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("invalid {field} '{token}'")]
    InvalidNumber { field: &'static str, token: String },

    #[error("month {0} is outside 1-12")]
    MonthOutOfRange(i64),

    #[error("day {0} is outside 1-31")]
    DayOutOfRange(i64),

    #[error("amount '{0}' is not a finite number")]
    NonFiniteAmount(String),

    #[error("unexpected trailing input '{0}'")]
    TrailingInput(String),
}

/// A feed line that does not match `<seq>,<month>/<day>,<amount>`
///
/// `fields` is how many of the four fields were scanned before the failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "line format error in {line:?}: {reason} (scanned {fields} of {} fields)",
    crate::parser::FIELD_COUNT
)]
pub struct ParseError {
    pub line: String,
    pub fields: usize,
    pub reason: ParseFailure,
}

// ============================================================================
// STORE ERRORS
// ============================================================================

/// Failures reported by the account and transaction stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// Lookup matched nothing. The only lookup failure that allows provisioning.
    #[error("entity not found")]
    NotFound,

    /// Unique constraint violated
    #[error("duplicated entry: {0}")]
    Duplicate(String),

    /// Busy or locked database; worth retrying
    #[error("store temporarily unavailable: {0}")]
    Transient(String),

    /// Stored row could not be decoded
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("database error")]
    Backend(#[source] rusqlite::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::QueryReturnedNoRows => return StoreError::NotFound,
            rusqlite::Error::SqliteFailure(code, message) => {
                let detail = message.clone().unwrap_or_else(|| code.to_string());
                match (code.code, code.extended_code) {
                    (
                        rusqlite::ErrorCode::ConstraintViolation,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
                    ) => return StoreError::Duplicate(detail),
                    (
                        rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked,
                        _,
                    ) => return StoreError::Transient(detail),
                    _ => {}
                }
            }
            _ => {}
        }
        StoreError::Backend(err)
    }
}

// ============================================================================
// NOTIFICATION ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("{notifier} notifier rejected the stats: {reason}")]
    Rejected { notifier: String, reason: String },

    #[error("{notifier} notifier I/O failure")]
    Io {
        notifier: String,
        #[source]
        source: io::Error,
    },

    #[error("{notifier} notifier could not encode the stats")]
    Encode {
        notifier: String,
        #[source]
        source: serde_json::Error,
    },

    /// Every notifier was attempted; these are the ones that failed
    #[error("{} notifier(s) failed: {}", .0.len(), join_failures(.0))]
    Aggregate(Vec<NotificationError>),
}

fn join_failures(failures: &[NotificationError]) -> String {
    failures
        .iter()
        .map(|f| error_chain(f))
        .collect::<Vec<_>>()
        .join("; ")
}

/// `err` followed by each of its sources, separated by ": "
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

// ============================================================================
// INGESTION ERRORS
// ============================================================================

/// Main error type of an ingestion run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("record {record} is malformed")]
    Parse {
        record: usize,
        #[source]
        source: ParseError,
    },

    #[error("failed to read record {record} from input")]
    StreamRead {
        record: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to look up account '{account_number}'")]
    AccountLookup {
        account_number: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to provision account '{account_number}'")]
    AccountProvisioning {
        account_number: String,
        #[source]
        source: StoreError,
    },

    #[error("{stage} failed{}", record.map(|r| format!(" at record {}", r)).unwrap_or_default())]
    Persistence {
        stage: Stage,
        record: Option<usize>,
        #[source]
        source: StoreError,
    },

    #[error("error notifying")]
    Notification(#[from] NotificationError),

    #[error("ingestion cancelled before {stage}")]
    Cancelled { stage: Stage },
}
