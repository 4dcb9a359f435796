//! Storage contracts the ingestion pipeline is written against.
//!
//! The pipeline only sees these traits; [`crate::db::SqliteStore`] is the
//! production implementation and tests substitute their own.

use crate::entities::{Account, TransactionRecord};
use crate::error::StoreError;

/// Accounts keyed by their external account number
pub trait AccountStore {
    /// `Err(StoreError::NotFound)` when no account carries `account_number`
    fn find_by_number(&self, account_number: &str) -> Result<Account, StoreError>;

    /// Create an account and return it with its assigned id
    fn create(&self, account_number: &str, balance: f32) -> Result<Account, StoreError>;

    /// Persist the account's current values
    fn update(&self, account: &Account) -> Result<Account, StoreError>;
}

/// Insert-only transaction log
pub trait TransactionStore {
    /// Store the record and return it with its assigned id
    fn insert(&self, record: TransactionRecord) -> Result<TransactionRecord, StoreError>;
}
