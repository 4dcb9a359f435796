// 🧾 Transaction Record - one accepted feed line
//
// Insert-only. Built by the parser, stored once, folded into the stats.

use chrono::{DateTime, Month, Utc};

use super::account::AccountId;

/// Storage-assigned transaction identity (SQLite rowid)
pub type TransactionId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// None until the transaction store assigns one
    pub id: Option<TransactionId>,

    /// Owning account (foreign key)
    pub account_id: AccountId,

    /// Shared by every record of one run
    pub processing_timestamp: DateTime<Utc>,

    /// Sequence number from the feed; not unique across runs
    pub sequence: i64,

    pub month: Month,

    /// 1-31, not checked against the month length
    pub day: u8,

    pub amount: f32,
}

impl TransactionRecord {
    /// Copy of this record carrying the id assigned by the store
    pub fn with_id(self, id: TransactionId) -> TransactionRecord {
        TransactionRecord {
            id: Some(id),
            ..self
        }
    }
}
