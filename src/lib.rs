// Transaction Feed - Core Library
// Exposes all modules for use in the CLI and tests

pub mod cancel;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod notify;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use config::Config;
pub use db::{setup_database, SqliteStore};
pub use entities::{Account, AccountId, TransactionId, TransactionRecord};
pub use error::{
    error_chain, IngestError, NotificationError, ParseError, ParseFailure, Stage, StoreError,
};
pub use notify::{LogNotifier, Notifier, NotifierSet, OutboxNotifier};
pub use parser::{parse_record, RecordContext};
pub use pipeline::IngestionPipeline;
pub use report::{render_report, write_report};
pub use resolver::AccountResolver;
pub use retry::{AttemptError, RetryPolicy};
pub use stats::{AccountStats, Bucket, MonthHistogram, RunningAverage};
pub use store::{AccountStore, TransactionStore};
