// ⚙️ Configuration - command line flags with TRANSACTIONS_* env fallbacks

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::cancel::CancelToken;
use crate::retry::RetryPolicy;

/// Ingest a transaction feed into an account and print its statistics
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "transaction-feed")]
#[command(about = "Ingest a transaction feed into an account and print its statistics", long_about = None)]
pub struct Config {
    /// Account the feed belongs to; created with a zero balance if unknown
    #[arg(
        long = "account-number",
        value_name = "NUMBER",
        env = "TRANSACTIONS_ACCOUNT_NUMBER",
        default_value = "123456"
    )]
    pub account_number: String,

    /// Feed file with a header line; stdin when absent
    #[arg(long = "file", value_name = "PATH", env = "TRANSACTIONS_FILE")]
    pub file: Option<PathBuf>,

    /// SQLite database, created on first use
    #[arg(
        long = "db",
        value_name = "PATH",
        env = "TRANSACTIONS_DB",
        default_value = "transactions.db"
    )]
    pub db: PathBuf,

    /// Append one JSON line per completed run to this file
    #[arg(long = "outbox", value_name = "PATH", env = "TRANSACTIONS_OUTBOX")]
    pub outbox: Option<PathBuf>,

    /// Attempts per store call when the database is busy
    #[arg(
        long = "retry-attempts",
        value_name = "COUNT",
        env = "TRANSACTIONS_RETRY_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub retry_attempts: u32,

    /// Backoff step between attempts, in milliseconds
    #[arg(
        long = "retry-backoff-ms",
        value_name = "MILLIS",
        env = "TRANSACTIONS_RETRY_BACKOFF_MS",
        default_value_t = 100
    )]
    pub retry_backoff_ms: u64,

    /// Abort the run once this many seconds have passed
    #[arg(long = "deadline-secs", value_name = "SECS", env = "TRANSACTIONS_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,
}

impl Config {
    pub fn parse_args() -> Self {
        Config::parse()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    /// Fresh token; carries a deadline when `deadline_secs` is set
    pub fn cancel_token(&self) -> CancelToken {
        match self.deadline_secs {
            Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
            None => CancelToken::new(),
        }
    }
}
