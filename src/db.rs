// 🗄️ SQLite Store - accounts + transactions on one connection
//
// One connection backs both stores and is used sequentially.
// WAL mode for crash recovery, foreign keys enforced.

use anyhow::{Context, Result};
use chrono::{DateTime, Month, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

use crate::entities::{Account, AccountId, TransactionRecord};
use crate::error::StoreError;
use crate::store::{AccountStore, TransactionStore};

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("Failed to enable WAL mode")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("Failed to enable foreign keys")?;

    // ==========================================================================
    // Accounts Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_number TEXT UNIQUE NOT NULL,
            balance REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Transactions Table (insert-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES accounts(id),
            processing_timestamp TEXT NOT NULL,
            file_transaction_id INTEGER NOT NULL,
            transaction_month INTEGER NOT NULL CHECK (transaction_month BETWEEN 1 AND 12),
            transaction_day INTEGER NOT NULL CHECK (transaction_day BETWEEN 1 AND 31),
            amount REAL NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// STORE
// ============================================================================

/// Account and transaction store over a single SQLite connection
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn count_transactions(&self) -> Result<i64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

        Ok(count)
    }

    /// Every stored transaction of an account, in insertion order
    pub fn transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, processing_timestamp, file_transaction_id,
                    transaction_month, transaction_day, amount
             FROM transactions
             WHERE account_id = ?1
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![account_id], |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    account_id: row.get(1)?,
                    processing_timestamp: row.get(2)?,
                    sequence: row.get(3)?,
                    month: row.get(4)?,
                    day: row.get(5)?,
                    amount: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredRow::into_record).collect()
    }
}

/// Raw `transactions` row before validation
struct StoredRow {
    id: i64,
    account_id: i64,
    processing_timestamp: String,
    sequence: i64,
    month: i64,
    day: i64,
    amount: f64,
}

impl StoredRow {
    fn into_record(self) -> Result<TransactionRecord, StoreError> {
        let processing_timestamp = DateTime::parse_from_rfc3339(&self.processing_timestamp)
            .map_err(|e| {
                StoreError::Corrupt(format!(
                    "transaction {} timestamp '{}': {}",
                    self.id, self.processing_timestamp, e
                ))
            })?
            .with_timezone(&Utc);

        let month = u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(|| {
                StoreError::Corrupt(format!("transaction {} month {}", self.id, self.month))
            })?;

        let day = u8::try_from(self.day).map_err(|_| {
            StoreError::Corrupt(format!("transaction {} day {}", self.id, self.day))
        })?;

        Ok(TransactionRecord {
            id: Some(self.id),
            account_id: self.account_id,
            processing_timestamp,
            sequence: self.sequence,
            month,
            day,
            amount: self.amount as f32,
        })
    }
}

impl AccountStore for SqliteStore {
    fn find_by_number(&self, account_number: &str) -> Result<Account, StoreError> {
        let account = self.conn.query_row(
            "SELECT id, account_number, balance FROM accounts WHERE account_number = ?1 LIMIT 1",
            params![account_number],
            |row| {
                let balance: f64 = row.get(2)?;
                Ok(Account::new(row.get(0)?, row.get::<_, String>(1)?, balance as f32))
            },
        )?;

        Ok(account)
    }

    fn create(&self, account_number: &str, balance: f32) -> Result<Account, StoreError> {
        self.conn.execute(
            "INSERT INTO accounts (account_number, balance) VALUES (?1, ?2)",
            params![account_number, f64::from(balance)],
        )?;

        Ok(Account::new(
            self.conn.last_insert_rowid(),
            account_number,
            balance,
        ))
    }

    fn update(&self, account: &Account) -> Result<Account, StoreError> {
        let updated = self.conn.execute(
            "UPDATE accounts SET account_number = ?1, balance = ?2 WHERE id = ?3",
            params![account.account_number, f64::from(account.balance), account.id],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(account.clone())
    }
}

impl TransactionStore for SqliteStore {
    fn insert(&self, record: TransactionRecord) -> Result<TransactionRecord, StoreError> {
        self.conn.execute(
            "INSERT INTO transactions (
                account_id, processing_timestamp, file_transaction_id,
                transaction_month, transaction_day, amount
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.account_id,
                record.processing_timestamp.to_rfc3339(),
                record.sequence,
                record.month.number_from_month(),
                record.day,
                f64::from(record.amount),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        Ok(record.with_id(id))
    }
}
